//! Pretrained artifacts, loaded once per process and shared read-only
//!
//! Loading is lazy: the first caller pays for reading and validating the
//! files, later callers get the same instance. A failed load is not cached,
//! so a corrected file can be picked up by the next call.

use crate::encoding::EncoderBundle;
use crate::model::ClusterModel;
use crate::satisfaction::SatisfactionModel;
use log::{debug, info};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

static SEGMENTATION: OnceCell<SegmentationArtifacts> = OnceCell::new();
static SATISFACTION: OnceCell<SatisfactionModel> = OnceCell::new();

/// Where the artifact files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub cluster_model: PathBuf,
    pub encoders: PathBuf,
    pub classifier: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            cluster_model: PathBuf::from("artifacts/cluster_model.json"),
            encoders: PathBuf::from("artifacts/encoders.json"),
            classifier: PathBuf::from("artifacts/satisfaction_model.json"),
        }
    }
}

/// The cluster model together with the encoders it was trained against
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationArtifacts {
    pub model: ClusterModel,
    pub encoders: EncoderBundle,
}

impl SegmentationArtifacts {
    pub fn load(paths: &ArtifactPaths) -> crate::Result<Self> {
        let model = ClusterModel::load(&paths.cluster_model)?;
        let encoders = EncoderBundle::load(&paths.encoders)?;
        info!(
            "Loaded cluster model ({} clusters x {} features) from {}",
            model.n_clusters(),
            model.n_features(),
            paths.cluster_model.display()
        );
        Ok(Self { model, encoders })
    }
}

/// Process-wide segmentation artifacts; `paths` only matter on the first call
pub fn segmentation(paths: &ArtifactPaths) -> crate::Result<&'static SegmentationArtifacts> {
    if SEGMENTATION.get().is_some() {
        debug!("Reusing loaded segmentation artifacts");
    }
    SEGMENTATION.get_or_try_init(|| SegmentationArtifacts::load(paths))
}

/// Process-wide satisfaction classifier
pub fn satisfaction_model(paths: &ArtifactPaths) -> crate::Result<&'static SatisfactionModel> {
    SATISFACTION.get_or_try_init(|| {
        let path = paths.classifier.as_path();
        let model = SatisfactionModel::load(path)?;
        info!(
            "Loaded satisfaction model ({} trees, {} features) from {}",
            model.trees.len(),
            model.feature_names.len(),
            path.display()
        );
        Ok(model)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENCODERS_JSON: &str = r#"{
        "encoders": {
            "Customer Type": ["Loyal Customer", "disloyal Customer"],
            "Type of Travel": ["Business travel", "Personal Travel"],
            "Class": ["Business", "Eco", "Eco Plus"],
            "AgeGroup": ["Middle-aged", "Old", "Young"],
            "FlightCategory": ["Long", "Short"]
        },
        "median_distance": 844.0
    }"#;

    fn json_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_segmentation_artifacts_load() {
        let model = json_file(r#"{"centroids": [[0, 0, 0, 0, 1], [1, 1, 1, 2, 0]]}"#);
        let encoders = json_file(ENCODERS_JSON);
        let paths = ArtifactPaths {
            cluster_model: model.path().to_path_buf(),
            encoders: encoders.path().to_path_buf(),
            ..ArtifactPaths::default()
        };

        let artifacts = SegmentationArtifacts::load(&paths).unwrap();
        assert_eq!(artifacts.model.n_clusters(), 2);
        assert_eq!(artifacts.encoders.median_distance, 844.0);

        // the shared instance is loaded once and then reused
        let shared = segmentation(&paths).unwrap();
        let again = segmentation(&ArtifactPaths::default()).unwrap();
        assert!(std::ptr::eq(shared, again));
    }

    #[test]
    fn test_missing_artifact_reports_path() {
        let paths = ArtifactPaths {
            cluster_model: PathBuf::from("/nonexistent/cluster_model.json"),
            ..ArtifactPaths::default()
        };
        match SegmentationArtifacts::load(&paths).unwrap_err() {
            Error::Artifact { path, .. } => assert_eq!(path, PathBuf::from("/nonexistent/cluster_model.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_encoder_field_rejected() {
        let model = json_file(r#"{"centroids": [[0, 0, 0, 0, 1]]}"#);
        let encoders = json_file(r#"{"encoders": {"Class": ["Eco"]}, "median_distance": 844.0}"#);
        let paths = ArtifactPaths {
            cluster_model: model.path().to_path_buf(),
            encoders: encoders.path().to_path_buf(),
            ..ArtifactPaths::default()
        };
        assert!(matches!(SegmentationArtifacts::load(&paths), Err(Error::Artifact { .. })));
    }
}
