//! Command-line interface definitions and argument parsing

use crate::anomaly::{DetectionMethod, DetectorConfig};
use crate::artifacts::ArtifactPaths;
use crate::data::{PassengerRecord, ServiceRatings};
use crate::error::Error;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Airline passenger segmentation, service recommendations and anomaly detection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Cluster model artifact (JSON centroids)
    #[arg(
        long,
        global = true,
        env = "SKYSATISFY_CLUSTER_MODEL",
        default_value = "artifacts/cluster_model.json"
    )]
    pub cluster_model: PathBuf,

    /// Categorical encoders artifact
    #[arg(
        long,
        global = true,
        env = "SKYSATISFY_ENCODERS",
        default_value = "artifacts/encoders.json"
    )]
    pub encoders: PathBuf,

    /// Satisfaction classifier artifact
    #[arg(
        long,
        global = true,
        env = "SKYSATISFY_CLASSIFIER",
        default_value = "artifacts/satisfaction_model.json"
    )]
    pub classifier: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assign every passenger of a CSV file to a cluster and recommend service improvements
    Segment {
        /// Path to the passenger CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the segmented CSV
        #[arg(short, long, default_value = "segmentation_results.csv")]
        output: PathBuf,

        /// Directory for SVG charts; no charts are drawn without it
        #[arg(long)]
        plot_dir: Option<PathBuf>,

        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Predict the cluster of a single passenger
    Predict {
        #[arg(long)]
        age: f64,

        /// e.g. "Loyal Customer"
        #[arg(long)]
        customer_type: String,

        /// e.g. "Business travel"
        #[arg(long)]
        travel_type: String,

        /// e.g. "Eco"
        #[arg(long)]
        class: String,

        #[arg(long)]
        flight_distance: f64,

        /// The 14 service ratings (1-5) as a comma-separated list, in dataset column order
        /// Example: --ratings "3,4,3,1,5,3,5,5,4,3,4,4,5,5"
        #[arg(long)]
        ratings: Option<String>,
    },

    /// Flag unusual passengers in a CSV file
    Anomaly {
        /// Path to the passenger CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write every passenger with its anomaly label
        #[arg(short, long, default_value = "anomaly_results.csv")]
        output: PathBuf,

        /// Also write the anomalous passengers alone to this file
        #[arg(long)]
        anomalies_only: Option<PathBuf>,

        /// Detection method
        #[arg(short, long, value_enum, default_value_t = MethodArg::IsolationForest)]
        method: MethodArg,

        /// Expected share of anomalies, strictly between 0 and 1
        #[arg(short, long, default_value = "0.05")]
        contamination: f64,

        /// Neighbourhood size for the local outlier factor
        #[arg(long, default_value = "20")]
        n_neighbors: usize,

        /// Trees in the isolation forest
        #[arg(long, default_value = "100")]
        n_estimators: usize,

        /// Rows sampled per isolation tree
        #[arg(long, default_value = "256")]
        max_samples: usize,

        /// Random seed for the isolation forest
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of anomalous passengers to preview
        #[arg(long, default_value = "10")]
        preview: usize,

        /// Directory for SVG charts; no charts are drawn without it
        #[arg(long)]
        plot_dir: Option<PathBuf>,

        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Predict passenger satisfaction with the pretrained classifier
    Satisfaction {
        /// Path to the passenger CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the passengers with their predicted satisfaction
        #[arg(short, long, default_value = "satisfaction_predictions.csv")]
        output: PathBuf,

        /// Number of feature importances to report
        #[arg(long, default_value = "10")]
        top: usize,

        /// Directory for SVG charts; no charts are drawn without it
        #[arg(long)]
        plot_dir: Option<PathBuf>,
    },

    /// Predict the satisfaction of a single passenger
    PredictSatisfaction {
        /// A feature value, repeatable; unset features take defaults
        /// Example: --set "Class=Eco" --set "Online boarding=4"
        #[arg(long = "set", value_name = "FEATURE=VALUE")]
        values: Vec<String>,

        /// Number of feature importances to report
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    IsolationForest,
    Lof,
}

impl From<MethodArg> for DetectionMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::IsolationForest => DetectionMethod::IsolationForest,
            MethodArg::Lof => DetectionMethod::LocalOutlierFactor,
        }
    }
}

impl Args {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            cluster_model: self.cluster_model.clone(),
            encoders: self.encoders.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

impl Command {
    /// The passenger described by `predict` arguments, `None` for other commands
    pub fn passenger_record(&self) -> crate::Result<Option<PassengerRecord>> {
        let Command::Predict {
            age,
            customer_type,
            travel_type,
            class,
            flight_distance,
            ratings,
        } = self
        else {
            return Ok(None);
        };

        let ratings = ratings.as_deref().map(parse_ratings).transpose()?;
        Ok(Some(PassengerRecord {
            age: *age,
            customer_type: customer_type.clone(),
            travel_type: travel_type.clone(),
            class: class.clone(),
            flight_distance: *flight_distance,
            ratings,
        }))
    }

    /// Detector settings from `anomaly` arguments, `None` for other commands
    pub fn detector_config(&self) -> Option<DetectorConfig> {
        match self {
            Command::Anomaly {
                method,
                contamination,
                n_neighbors,
                n_estimators,
                max_samples,
                seed,
                ..
            } => Some(DetectorConfig {
                method: (*method).into(),
                contamination: *contamination,
                n_neighbors: *n_neighbors,
                n_estimators: *n_estimators,
                max_samples: *max_samples,
                seed: *seed,
            }),
            _ => None,
        }
    }

    /// Feature values given to `predict-satisfaction`, `None` for other commands
    ///
    /// A feature given twice keeps its last value.
    pub fn manual_features(&self) -> crate::Result<Option<BTreeMap<String, String>>> {
        let Command::PredictSatisfaction { values, .. } = self else {
            return Ok(None);
        };
        values
            .iter()
            .map(|raw| parse_feature_value(raw))
            .collect::<crate::Result<BTreeMap<_, _>>>()
            .map(Some)
    }
}

/// Split "Feature=value" at the first '='
pub fn parse_feature_value(raw: &str) -> crate::Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim().to_string())),
        _ => Err(Error::InvalidParameter {
            name: "set",
            value: raw.to_string(),
            reason: "expected FEATURE=VALUE",
        }),
    }
}

/// Parse 14 comma-separated service ratings
pub fn parse_ratings(raw: &str) -> crate::Result<ServiceRatings> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(Error::InvalidParameter {
            name: "ratings",
            value: raw.to_string(),
            reason: "ratings must be comma-separated numbers",
        });
    }
    ServiceRatings::parse(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratings() {
        let ratings = parse_ratings("3,4,3,1,5,3,5,5,4,3,4,4,5,5").unwrap();
        assert_eq!(ratings.get(3), 1);

        assert!(parse_ratings("3,4,3").is_err());
        assert!(parse_ratings("3,4,3,1,5,3,5,5,4,3,4,4,5,9").is_err());
        assert!(parse_ratings("3,4,3,1,5,,5,5,4,3,4,4,5,5").is_err());
    }

    #[test]
    fn test_predict_command() {
        let args = Args::try_parse_from([
            "skysatisfy",
            "predict",
            "--age",
            "35",
            "--customer-type",
            "Loyal Customer",
            "--travel-type",
            "Business travel",
            "--class",
            "Eco",
            "--flight-distance",
            "1200",
        ])
        .unwrap();

        let record = args.command.passenger_record().unwrap().unwrap();
        assert_eq!(record.age, 35.0);
        assert_eq!(record.customer_type, "Loyal Customer");
        assert!(record.ratings.is_none());
        assert!(args.command.detector_config().is_none());
    }

    #[test]
    fn test_anomaly_command_defaults() {
        let args = Args::try_parse_from(["skysatisfy", "anomaly", "--input", "passengers.csv"]).unwrap();
        let config = args.command.detector_config().unwrap();
        assert_eq!(config, DetectorConfig::default());
        assert!(args.command.passenger_record().unwrap().is_none());
    }

    #[test]
    fn test_anomaly_command_lof() {
        let args = Args::try_parse_from([
            "skysatisfy",
            "anomaly",
            "-i",
            "passengers.csv",
            "--method",
            "lof",
            "--contamination",
            "0.1",
            "--n-neighbors",
            "5",
        ])
        .unwrap();
        let config = args.command.detector_config().unwrap();
        assert_eq!(config.method, DetectionMethod::LocalOutlierFactor);
        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.n_neighbors, 5);
    }

    #[test]
    fn test_global_artifact_flags() {
        let args = Args::try_parse_from([
            "skysatisfy",
            "segment",
            "--input",
            "passengers.csv",
            "--cluster-model",
            "models/clusters.json",
        ])
        .unwrap();
        let paths = args.artifact_paths();
        assert_eq!(paths.cluster_model, PathBuf::from("models/clusters.json"));
    }

    #[test]
    fn test_predict_satisfaction_command() {
        let args = Args::try_parse_from([
            "skysatisfy",
            "predict-satisfaction",
            "--set",
            "Class=Eco",
            "--set",
            "Online boarding = 4",
            "--set",
            "Class=Business",
        ])
        .unwrap();

        let features = args.command.manual_features().unwrap().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features["Class"], "Business");
        assert_eq!(features["Online boarding"], "4");
        assert!(args.command.passenger_record().unwrap().is_none());
    }

    #[test]
    fn test_parse_feature_value() {
        assert_eq!(
            parse_feature_value("Departure/Arrival time convenient=2").unwrap(),
            ("Departure/Arrival time convenient".to_string(), "2".to_string())
        );
        assert!(parse_feature_value("Class").is_err());
        assert!(parse_feature_value("=Eco").is_err());
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert!(Args::try_parse_from(["skysatisfy", "anomaly", "-i", "x.csv", "--method", "svm"]).is_err());
    }
}
