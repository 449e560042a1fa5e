//! State carried between steps of one interactive analysis

use crate::data::{PassengerRecord, PassengerTable};
use crate::model::ClusterId;
use crate::segment::{SegmentationResult, Segmenter};
use log::debug;

/// Holds the latest segmentation so later steps (recommendations, charts,
/// downloads) can read it without re-running the model
#[derive(Debug, Default)]
pub struct AnalysisSession {
    segmentation: Option<SegmentationResult>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment an upload and keep the result, replacing any earlier one
    ///
    /// On failure the previous result is left untouched.
    pub fn segment_upload(
        &mut self,
        segmenter: &Segmenter<'_>,
        table: &PassengerTable,
    ) -> crate::Result<&SegmentationResult> {
        let result = segmenter.segment_table(table)?;
        Ok(self.store(result))
    }

    /// Segment one manually entered passenger and keep the result
    pub fn segment_passenger(
        &mut self,
        segmenter: &Segmenter<'_>,
        record: PassengerRecord,
    ) -> crate::Result<&SegmentationResult> {
        let result = segmenter.segment_record(record)?;
        Ok(self.store(result))
    }

    fn store(&mut self, result: SegmentationResult) -> &SegmentationResult {
        if self.segmentation.is_some() {
            debug!("Replacing previous segmentation");
        }
        self.segmentation.insert(result)
    }

    pub fn segmentation(&self) -> Option<&SegmentationResult> {
        self.segmentation.as_ref()
    }

    /// Clusters available for selection, empty before any segmentation
    pub fn clusters(&self) -> Vec<ClusterId> {
        self.segmentation
            .as_ref()
            .map(SegmentationResult::clusters)
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.segmentation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SEGMENT_REQUIRED_COLUMNS;
    use crate::encoding::tests::test_bundle;
    use crate::model::tests::test_model;

    fn table(rows: &[&str]) -> PassengerTable {
        PassengerTable::new(
            SEGMENT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.split(',').map(str::to_string).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_session_keeps_latest_result() {
        let bundle = test_bundle();
        let model = test_model();
        let segmenter = Segmenter::new(&bundle, &model);
        let mut session = AnalysisSession::new();
        assert!(session.clusters().is_empty());

        session
            .segment_upload(&segmenter, &table(&["45,Loyal Customer,Business travel,Business,2000"]))
            .unwrap();
        assert_eq!(session.clusters(), vec![0]);

        session
            .segment_upload(&segmenter, &table(&["25,disloyal Customer,Personal Travel,Eco,300"]))
            .unwrap();
        assert_eq!(session.clusters(), vec![1]);

        session.clear();
        assert!(session.segmentation().is_none());
    }

    #[test]
    fn test_failed_upload_keeps_previous_result() {
        let bundle = test_bundle();
        let model = test_model();
        let segmenter = Segmenter::new(&bundle, &model);
        let mut session = AnalysisSession::new();

        session
            .segment_upload(&segmenter, &table(&["45,Loyal Customer,Business travel,Business,2000"]))
            .unwrap();
        assert!(session
            .segment_upload(&segmenter, &table(&["45,Unknown,Business travel,Business,2000"]))
            .is_err());
        assert_eq!(session.clusters(), vec![0]);
    }
}
