//! Error taxonomy for the analysis pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the encoding, assignment, recommendation and detection stages
#[derive(Error, Debug)]
pub enum Error {
    /// A categorical value outside the fitted vocabulary of its encoder
    #[error("unknown value {value:?} for field '{field}' (not seen when the encoder was fitted)")]
    Encoding { field: String, value: String },

    /// Feature vector width does not match the model artifact
    #[error("model expects {expected} features but received {actual}")]
    ModelInference { expected: usize, actual: usize },

    #[error("CSV is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("{rows} row(s) is not enough for anomaly detection (need at least {required})")]
    InsufficientData { rows: usize, required: usize },

    #[error("row {row}: column '{column}' has invalid value {value:?}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("rating for '{service}' must be between 1 and 5, got {value}")]
    InvalidRating { service: String, value: String },

    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Artifact file missing, malformed or internally inconsistent
    #[error("artifact {}: {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("neighbour search failed: {0}")]
    NeighborSearch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn encoding(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Encoding {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can fix the input and try again, as opposed to
    /// artifact/schema drift that needs operator attention
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Encoding { .. }
                | Self::MissingColumns { .. }
                | Self::InsufficientData { .. }
                | Self::InvalidValue { .. }
                | Self::RowWidth { .. }
                | Self::InvalidRating { .. }
                | Self::InvalidParameter { .. }
        )
    }
}
