//! Passenger segmentation: bucket, encode and assign every passenger to a cluster
//!
//! An upload is all-or-nothing. If any row carries a categorical value the
//! encoders have never seen, the whole upload fails and no assignments are
//! produced.

use crate::data::{
    passenger_records, PassengerRecord, PassengerTable, AGE, CLASS, CUSTOMER_TYPE, FLIGHT_DISTANCE,
    SEGMENT_REQUIRED_COLUMNS, SERVICE_COLUMNS, TRAVEL_TYPE,
};
use crate::encoding::{AgeGroup, EncoderBundle, FeatureEncoder, FlightCategory, AGE_GROUP, FLIGHT_CATEGORY};
use crate::model::{ClusterId, ClusterModel};
use crate::recommend::{recommend, strongest_services, ClusterRecommendation, ServiceScore};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Column holding the cluster id in the output file
pub const ASSIGNED_CLUSTER: &str = "Assigned Cluster";

/// One passenger with the buckets and cluster derived for it
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedPassenger {
    pub record: PassengerRecord,
    pub age_group: AgeGroup,
    pub flight_category: FlightCategory,
    pub cluster: ClusterId,
}

/// Assignments for every row of an upload, plus the annotated table
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    table: PassengerTable,
    passengers: Vec<SegmentedPassenger>,
}

impl SegmentationResult {
    /// The upload with `AgeGroup`, `FlightCategory` and `Assigned Cluster` set
    pub fn table(&self) -> &PassengerTable {
        &self.table
    }

    pub fn passengers(&self) -> &[SegmentedPassenger] {
        &self.passengers
    }

    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    /// Cluster of each passenger, in row order
    pub fn assignments(&self) -> Vec<ClusterId> {
        self.passengers.iter().map(|p| p.cluster).collect()
    }

    /// Distinct clusters present in this upload, ascending
    pub fn clusters(&self) -> Vec<ClusterId> {
        self.passengers
            .iter()
            .map(|p| p.cluster)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn cluster_sizes(&self) -> BTreeMap<ClusterId, usize> {
        let mut sizes = BTreeMap::new();
        for passenger in &self.passengers {
            *sizes.entry(passenger.cluster).or_insert(0) += 1;
        }
        sizes
    }

    pub fn members(&self, cluster: ClusterId) -> impl Iterator<Item = &SegmentedPassenger> + '_ {
        self.passengers.iter().filter(move |p| p.cluster == cluster)
    }

    /// Services to improve for one cluster, from the ratings of its rated members
    pub fn recommendation(&self, cluster: ClusterId) -> ClusterRecommendation {
        let passengers = self.members(cluster).count();
        let recommendation = recommend(self.members(cluster).filter_map(|p| p.record.ratings.as_ref()));
        ClusterRecommendation {
            cluster,
            passengers,
            recommendation,
        }
    }

    /// One recommendation per cluster present, ascending by cluster id
    pub fn recommendations(&self) -> Vec<ClusterRecommendation> {
        self.clusters()
            .into_iter()
            .map(|cluster| self.recommendation(cluster))
            .collect()
    }

    /// Highest-rated services of one cluster
    pub fn strongest(&self, cluster: ClusterId) -> Vec<ServiceScore> {
        strongest_services(self.members(cluster).filter_map(|p| p.record.ratings.as_ref()))
    }

    pub fn report(&self) -> SegmentationReport {
        SegmentationReport {
            passengers: self.len(),
            cluster_sizes: self.cluster_sizes(),
            recommendations: self.recommendations(),
            strongest: self
                .clusters()
                .into_iter()
                .map(|cluster| (cluster, self.strongest(cluster)))
                .collect(),
        }
    }
}

/// Serializable overview of a segmentation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    pub passengers: usize,
    pub cluster_sizes: BTreeMap<ClusterId, usize>,
    pub recommendations: Vec<ClusterRecommendation>,
    pub strongest: BTreeMap<ClusterId, Vec<ServiceScore>>,
}

/// Runs passengers through the encoders and the cluster model
#[derive(Debug, Clone, Copy)]
pub struct Segmenter<'a> {
    encoder: FeatureEncoder<'a>,
    model: &'a ClusterModel,
}

impl<'a> Segmenter<'a> {
    pub fn new(encoders: &'a EncoderBundle, model: &'a ClusterModel) -> Self {
        Self {
            encoder: FeatureEncoder::new(encoders),
            model,
        }
    }

    /// Segment a single passenger
    pub fn classify(&self, record: PassengerRecord) -> crate::Result<SegmentedPassenger> {
        let (age_group, flight_category) = self.encoder.buckets(&record);
        let vector = self.encoder.encode(&record)?;
        let cluster = self.model.assign(&vector)?;
        Ok(SegmentedPassenger {
            record,
            age_group,
            flight_category,
            cluster,
        })
    }

    /// Segment every row of an uploaded table
    ///
    /// Re-segmenting a previously written output file replaces its derived
    /// columns rather than duplicating them.
    ///
    /// # Arguments
    /// * `table` - Uploaded passengers with the segmentation columns
    ///
    /// # Returns
    /// * The annotated table and per-passenger clusters, or the first
    ///   encoding error; no partial result is produced
    pub fn segment_table(&self, table: &PassengerTable) -> crate::Result<SegmentationResult> {
        let records = passenger_records(table)?;
        debug!("Segmenting {} passengers", records.len());

        let passengers = records
            .into_iter()
            .map(|record| self.classify(record))
            .collect::<crate::Result<Vec<_>>>()?;

        let mut annotated = table.clone();
        annotated.set_column(
            AGE_GROUP,
            passengers.iter().map(|p| p.age_group.to_string()).collect(),
        );
        annotated.set_column(
            FLIGHT_CATEGORY,
            passengers.iter().map(|p| p.flight_category.to_string()).collect(),
        );
        annotated.set_column(
            ASSIGNED_CLUSTER,
            passengers.iter().map(|p| p.cluster.to_string()).collect(),
        );

        let result = SegmentationResult {
            table: annotated,
            passengers,
        };
        info!(
            "Assigned {} passengers to {} clusters",
            result.len(),
            result.clusters().len()
        );
        Ok(result)
    }

    /// Segment one manually entered passenger as a single-row upload
    pub fn segment_record(&self, record: PassengerRecord) -> crate::Result<SegmentationResult> {
        self.segment_table(&record_table(&record)?)
    }
}

/// A one-row table holding `record` under the upload column names
pub fn record_table(record: &PassengerRecord) -> crate::Result<PassengerTable> {
    let mut headers: Vec<String> = SEGMENT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut row = Vec::with_capacity(headers.len() + SERVICE_COLUMNS.len());
    for column in SEGMENT_REQUIRED_COLUMNS {
        row.push(match column {
            AGE => record.age.to_string(),
            CUSTOMER_TYPE => record.customer_type.clone(),
            TRAVEL_TYPE => record.travel_type.clone(),
            CLASS => record.class.clone(),
            FLIGHT_DISTANCE => record.flight_distance.to_string(),
            _ => String::new(),
        });
    }
    if let Some(ratings) = &record.ratings {
        headers.extend(SERVICE_COLUMNS.iter().map(|c| c.to_string()));
        row.extend(ratings.values().iter().map(|v| v.to_string()));
    }
    PassengerTable::new(headers, vec![row])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ServiceRatings;
    use crate::encoding::tests::test_bundle;
    use crate::error::Error;
    use crate::model::tests::test_model;
    use crate::recommend::Recommendation;
    use pretty_assertions::assert_eq;

    fn record(age: f64, customer_type: &str, travel_type: &str, class: &str, distance: f64) -> PassengerRecord {
        PassengerRecord {
            age,
            customer_type: customer_type.to_string(),
            travel_type: travel_type.to_string(),
            class: class.to_string(),
            flight_distance: distance,
            ratings: None,
        }
    }

    fn upload() -> PassengerTable {
        let mut headers: Vec<String> = vec!["id".to_string()];
        headers.extend(SEGMENT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()));
        headers.extend(SERVICE_COLUMNS.iter().map(|c| c.to_string()));
        let rows = [
            "1,45,Loyal Customer,Business travel,Business,2000,4,4,4,4,4,4,4,4,4,4,4,4,4,4",
            "2,25,disloyal Customer,Personal Travel,Eco,300,1,2,3,4,5,5,5,5,5,5,5,5,5,5",
            "3,70,Loyal Customer,Personal Travel,Eco,500,3,2,1,4,5,5,5,5,5,5,5,5,5,5",
        ]
        .iter()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect();
        PassengerTable::new(headers, rows).unwrap()
    }

    #[test]
    fn test_classify_single_passenger() {
        let bundle = test_bundle();
        let model = test_model();
        let segmenter = Segmenter::new(&bundle, &model);

        // Loyal(0), Business travel(0), Business(0), Middle-aged(0), Long(0)
        let passenger = segmenter
            .classify(record(45.0, "Loyal Customer", "Business travel", "Business", 2000.0))
            .unwrap();
        assert_eq!(passenger.age_group, AgeGroup::MiddleAged);
        assert_eq!(passenger.flight_category, FlightCategory::Long);
        assert_eq!(passenger.cluster, 0);
    }

    #[test]
    fn test_unknown_category_fails_whole_upload() {
        let bundle = test_bundle();
        let model = test_model();
        let mut table = upload();
        table.set_column(
            CUSTOMER_TYPE,
            vec!["Loyal Customer".into(), "Unknown".into(), "Loyal Customer".into()],
        );
        let err = Segmenter::new(&bundle, &model).segment_table(&table).unwrap_err();
        assert!(matches!(err, Error::Encoding { ref value, .. } if value == "Unknown"));
    }

    #[test]
    fn test_segment_table_adds_columns() {
        let bundle = test_bundle();
        let model = test_model();
        let result = Segmenter::new(&bundle, &model).segment_table(&upload()).unwrap();

        // row 2: disloyal(1), Personal(1), Eco(1), Young(2), Short(1) -> [1,1,1,2,1]
        // row 3: Loyal(0), Personal(1), Eco(1), Old(1), Short(1) -> [0,1,1,1,1]
        assert_eq!(result.assignments(), vec![0, 1, 2]);
        assert_eq!(result.clusters(), vec![0, 1, 2]);

        let table = result.table();
        assert_eq!(table.headers().len(), upload().headers().len() + 3);
        assert_eq!(table.cell(1, AGE_GROUP), Some("Young"));
        assert_eq!(table.cell(2, FLIGHT_CATEGORY), Some("Short"));
        assert_eq!(table.cell(0, ASSIGNED_CLUSTER), Some("0"));
        assert_eq!(table.cell(2, "id"), Some("3"));
    }

    #[test]
    fn test_resegmenting_output_is_stable() {
        let bundle = test_bundle();
        let model = test_model();
        let segmenter = Segmenter::new(&bundle, &model);
        let first = segmenter.segment_table(&upload()).unwrap();
        let second = segmenter.segment_table(first.table()).unwrap();
        assert_eq!(second.assignments(), first.assignments());
        assert_eq!(second.table(), first.table());
    }

    #[test]
    fn test_recommendation_per_cluster() {
        let bundle = test_bundle();
        let model = test_model();
        let result = Segmenter::new(&bundle, &model).segment_table(&upload()).unwrap();

        let rec = result.recommendation(2);
        assert_eq!(rec.passengers, 1);
        let services: Vec<&str> = rec.recommendation.services().iter().map(|s| s.service).collect();
        assert_eq!(
            services,
            vec![
                "Ease of Online booking",
                "Departure/Arrival time convenient",
                "Inflight wifi service",
                "Gate location",
                "Food and drink",
            ]
        );

        assert_eq!(result.recommendation(7).recommendation, Recommendation::NoPassengers);
        assert_eq!(result.recommendations().len(), 3);
        assert_eq!(result.strongest(0)[0].mean, 4.0);
    }

    #[test]
    fn test_unrated_upload_has_empty_recommendations() {
        let bundle = test_bundle();
        let model = test_model();
        let table = upload().project(&SEGMENT_REQUIRED_COLUMNS);
        let result = Segmenter::new(&bundle, &model).segment_table(&table).unwrap();
        assert!(result.recommendations().iter().all(|r| r.recommendation.is_empty()));
        assert!(result.strongest(0).is_empty());
    }

    #[test]
    fn test_segment_manual_record() {
        let bundle = test_bundle();
        let model = test_model();
        let mut passenger = record(25.0, "disloyal Customer", "Personal Travel", "Eco", 300.0);
        passenger.ratings = Some(ServiceRatings::new([3; 14]).unwrap());

        let result = Segmenter::new(&bundle, &model).segment_record(passenger.clone()).unwrap();
        assert_eq!(result.assignments(), vec![1]);
        assert_eq!(result.passengers()[0].record, passenger);
        assert_eq!(result.table().cell(0, AGE), Some("25"));
    }

    #[test]
    fn test_report_counts() {
        let bundle = test_bundle();
        let model = test_model();
        let report = Segmenter::new(&bundle, &model).segment_table(&upload()).unwrap().report();
        assert_eq!(report.passengers, 3);
        assert_eq!(report.cluster_sizes, BTreeMap::from([(0, 1), (1, 1), (2, 1)]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["recommendations"][0]["status"], "improve");
    }
}
