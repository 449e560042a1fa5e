//! Anomaly detection over a whole uploaded passenger file
//!
//! The file is treated as one population: categorical columns are encoded
//! with encoders fitted on this file alone, every row is scored by the chosen
//! [`OutlierScorer`], and the `contamination` fraction with the lowest
//! normality scores is labelled [`AnomalyLabel::Anomaly`].

pub mod isolation_forest;
pub mod lof;

pub use isolation_forest::IsolationForest;
pub use lof::LocalOutlierFactor;

use crate::data::{
    PassengerTable, AGE, ARRIVAL_DELAY, CLASS, CUSTOMER_TYPE, DEPARTURE_DELAY, FLIGHT_DISTANCE,
    GENDER, SATISFACTION, SERVICE_COLUMNS, TRAVEL_TYPE,
};
use crate::encoding::CategoricalEncoder;
use crate::error::Error;
use log::{debug, info};
use ndarray::Array2;
use serde::Serialize;
use std::fmt;

/// Column added to the output file
pub const ANOMALY_COLUMN: &str = "anomaly";

/// Columns label-encoded per uploaded file
pub const CATEGORICAL_COLUMNS: [&str; 5] = [GENDER, CUSTOMER_TYPE, TRAVEL_TYPE, CLASS, SATISFACTION];

/// Columns shown for the anomalous passengers preview
pub const PREVIEW_COLUMNS: [&str; 9] = [
    GENDER,
    CUSTOMER_TYPE,
    AGE,
    TRAVEL_TYPE,
    CLASS,
    FLIGHT_DISTANCE,
    DEPARTURE_DELAY,
    ARRIVAL_DELAY,
    SATISFACTION,
];

/// Fewest rows either scorer can work with
pub const MIN_ROWS: usize = 2;

/// Feature matrix column order
pub fn feature_columns() -> Vec<&'static str> {
    let mut columns = vec![GENDER, CUSTOMER_TYPE, AGE, TRAVEL_TYPE, CLASS, FLIGHT_DISTANCE];
    columns.extend_from_slice(&SERVICE_COLUMNS);
    columns.extend_from_slice(&[DEPARTURE_DELAY, ARRIVAL_DELAY, SATISFACTION]);
    columns
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyLabel {
    Normal,
    Anomaly,
}

impl AnomalyLabel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Anomaly => "Anomaly",
        }
    }
}

impl fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected share of outliers, strictly between 0 and 1
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Contamination(f64);

impl Contamination {
    pub fn new(value: f64) -> crate::Result<Self> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidParameter {
                name: "contamination",
                value: value.to_string(),
                reason: "must lie strictly between 0 and 1 (0.01 to 0.2 is typical)",
            })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Scores how normal each row of a feature matrix looks
pub trait OutlierScorer {
    /// One score per row, in row order; lower means more anomalous
    fn score_samples(&self, features: &Array2<f64>) -> crate::Result<Vec<f64>>;

    fn detect(&self, features: &Array2<f64>, contamination: Contamination) -> crate::Result<Vec<AnomalyLabel>> {
        let scores = self.score_samples(features)?;
        Ok(label_by_contamination(&scores, contamination))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetectionMethod {
    IsolationForest,
    LocalOutlierFactor,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IsolationForest => f.write_str("Isolation Forest"),
            Self::LocalOutlierFactor => f.write_str("Local Outlier Factor"),
        }
    }
}

/// Detector tuning; defaults match the dashboard's settings
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub method: DetectionMethod,
    pub contamination: f64,
    /// Neighbourhood size for LOF
    pub n_neighbors: usize,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: DetectionMethod::IsolationForest,
            contamination: 0.05,
            n_neighbors: 20,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// The configured scorer
#[derive(Debug, Clone, PartialEq)]
pub enum Detector {
    IsolationForest(IsolationForest),
    LocalOutlierFactor(LocalOutlierFactor),
}

impl Detector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        match config.method {
            DetectionMethod::IsolationForest => Self::IsolationForest(IsolationForest {
                n_estimators: config.n_estimators,
                max_samples: config.max_samples,
                seed: config.seed,
            }),
            DetectionMethod::LocalOutlierFactor => Self::LocalOutlierFactor(LocalOutlierFactor {
                n_neighbors: config.n_neighbors,
            }),
        }
    }
}

impl OutlierScorer for Detector {
    fn score_samples(&self, features: &Array2<f64>) -> crate::Result<Vec<f64>> {
        match self {
            Self::IsolationForest(forest) => forest.score_samples(features),
            Self::LocalOutlierFactor(lof) => lof.score_samples(features),
        }
    }
}

/// Rows scoring strictly below the interpolated `contamination` percentile are anomalies
pub fn label_by_contamination(scores: &[f64], contamination: Contamination) -> Vec<AnomalyLabel> {
    if scores.is_empty() {
        return Vec::new();
    }
    let threshold = percentile(scores, contamination.value());
    scores
        .iter()
        .map(|&s| {
            if s < threshold {
                AnomalyLabel::Anomaly
            } else {
                AnomalyLabel::Normal
            }
        })
        .collect()
}

/// Linear-interpolation percentile, `fraction` in [0, 1]
fn percentile(values: &[f64], fraction: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// Encode the file into the detector's feature matrix
///
/// Categorical columns get encoders fitted on this file only; empty delay
/// cells count as zero minutes.
pub fn feature_matrix(table: &PassengerTable) -> crate::Result<Array2<f64>> {
    let columns = feature_columns();
    table.require_columns(&columns)?;

    let mut matrix = Array2::zeros((table.len(), columns.len()));
    for (j, &column) in columns.iter().enumerate() {
        let values = if CATEGORICAL_COLUMNS.contains(&column) {
            let raw = table.str_column(column)?;
            let encoder = CategoricalEncoder::fit(raw.iter());
            debug!("Encoded '{}' with {} classes", column, encoder.len());
            raw.iter()
                .map(|v| encoder.transform(v).map(|c| c as f64))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| Error::encoding(column, "<unfitted>"))?
        } else if column == DEPARTURE_DELAY || column == ARRIVAL_DELAY {
            table.numeric_column_or(column, 0.0)?
        } else {
            table.numeric_column(column)?
        };

        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }

    Ok(matrix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnomalySummary {
    pub normal: usize,
    pub anomaly: usize,
}

/// Labels for every row of one detector run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub method: DetectionMethod,
    pub contamination: f64,
    pub labels: Vec<AnomalyLabel>,
    pub scores: Vec<f64>,
}

impl AnomalyReport {
    pub fn summary(&self) -> AnomalySummary {
        let anomaly = self.labels.iter().filter(|&&l| l == AnomalyLabel::Anomaly).count();
        AnomalySummary {
            normal: self.labels.len() - anomaly,
            anomaly,
        }
    }

    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == AnomalyLabel::Anomaly)
            .map(|(i, _)| i)
            .collect()
    }

    /// The input table with the `anomaly` column set, rows in input order
    pub fn annotate(&self, table: &PassengerTable) -> PassengerTable {
        let mut annotated = table.clone();
        annotated.set_column(
            ANOMALY_COLUMN,
            self.labels.iter().map(|l| l.label().to_string()).collect(),
        );
        annotated
    }

    /// Only the anomalous rows of the annotated table
    pub fn anomalies(&self, table: &PassengerTable) -> PassengerTable {
        self.annotate(table).select_rows(&self.anomaly_indices())
    }

    /// First `limit` anomalous passengers restricted to [`PREVIEW_COLUMNS`]
    pub fn preview(&self, table: &PassengerTable, limit: usize) -> PassengerTable {
        let mut indices = self.anomaly_indices();
        indices.truncate(limit);
        table.select_rows(&indices).project(&PREVIEW_COLUMNS)
    }
}

/// Run the configured detector over every row of `table`
///
/// # Arguments
/// * `table` - Uploaded passengers; every feature column must be present
/// * `config` - Detection method, contamination and method parameters
///
/// # Returns
/// * One score and label per row, in row order
pub fn detect(table: &PassengerTable, config: &DetectorConfig) -> crate::Result<AnomalyReport> {
    let contamination = Contamination::new(config.contamination)?;
    let features = feature_matrix(table)?;
    if features.nrows() < MIN_ROWS {
        return Err(Error::InsufficientData {
            rows: features.nrows(),
            required: MIN_ROWS,
        });
    }

    debug!(
        "Scoring {} rows x {} features with {} (contamination {})",
        features.nrows(),
        features.ncols(),
        config.method,
        contamination.value()
    );
    let detector = Detector::from_config(config);
    let scores = detector.score_samples(&features)?;
    let labels = label_by_contamination(&scores, contamination);

    let report = AnomalyReport {
        method: config.method,
        contamination: contamination.value(),
        labels,
        scores,
    };
    let summary = report.summary();
    info!(
        "{}: {} anomalies, {} normal",
        config.method, summary.anomaly, summary.normal
    );
    Ok(report)
}
