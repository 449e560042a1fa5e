//! skysatisfy: airline passenger segmentation over pretrained model artifacts
//!
//! Passengers are bucketed by age and flight length, encoded with the
//! encoders the cluster model was trained against and assigned to the nearest
//! centroid. Per-cluster service averages drive improvement recommendations.
//! Independently, whole uploads can be screened for anomalous passengers and
//! scored by a pretrained satisfaction classifier.

pub mod anomaly;
pub mod artifacts;
pub mod cli;
pub mod data;
pub mod encoding;
pub mod error;
pub mod model;
pub mod recommend;
pub mod satisfaction;
pub mod segment;
pub mod session;
pub mod viz;

// Re-export public items for easier access
pub use anomaly::{detect, AnomalyLabel, AnomalyReport, DetectionMethod, DetectorConfig};
pub use artifacts::{ArtifactPaths, SegmentationArtifacts};
pub use cli::Args;
pub use data::{PassengerRecord, PassengerTable, ServiceRatings};
pub use encoding::{EncoderBundle, FeatureEncoder};
pub use error::Error;
pub use model::{ClusterId, ClusterModel};
pub use recommend::{recommend, ClusterRecommendation, Recommendation};
pub use satisfaction::SatisfactionModel;
pub use segment::{SegmentationResult, Segmenter};
pub use session::AnalysisSession;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
