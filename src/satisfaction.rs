//! Satisfaction classifier artifact and prediction
//!
//! The artifact is a forest of binary decision trees whose leaves carry the
//! probability of "satisfied". A row is predicted satisfied when the mean leaf
//! probability over the forest exceeds one half.

use crate::data::{PassengerTable, AGE, ARRIVAL_DELAY, DEPARTURE_DELAY, FLIGHT_DISTANCE, SERVICE_COLUMNS};
use crate::encoding::CategoricalEncoder;
use crate::error::Error;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const PREDICTED_COLUMN: &str = "Predicted Satisfaction";
pub const PREDICTED_LABEL_COLUMN: &str = "Predicted Satisfaction Label";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Satisfaction {
    NeutralOrDissatisfied,
    Satisfied,
}

impl Satisfaction {
    pub fn code(self) -> u8 {
        match self {
            Self::NeutralOrDissatisfied => 0,
            Self::Satisfied => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NeutralOrDissatisfied => "Neutral or Dissatisfied",
            Self::Satisfied => "Satisfied",
        }
    }
}

impl fmt::Display for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `feature <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must come after their parent, which rules out cycles
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    threshold,
                } => {
                    if feature >= n_features {
                        return Err(format!("node {i} splits on feature {feature} of {n_features}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(&probability) {
                        return Err(format!("node {i} has probability {probability}"));
                    }
                }
            }
        }
        Ok(())
    }

    fn probability(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes[node] {
                TreeNode::Leaf { probability } => return probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pretrained satisfaction classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatisfactionModel {
    pub feature_names: Vec<String>,
    pub feature_importances: Vec<f64>,
    /// Encoders for the categorical features, keyed by feature name
    #[serde(default)]
    pub encoders: BTreeMap<String, CategoricalEncoder>,
    pub trees: Vec<DecisionTree>,
}

impl SatisfactionModel {
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::artifact(path, e.to_string()))?;
        let model: Self = serde_json::from_str(&text).map_err(|e| Error::artifact(path, e.to_string()))?;
        model.validate().map_err(|reason| Error::artifact(path, reason))?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), String> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err("model has no features".to_string());
        }
        if self.feature_importances.len() != n_features {
            return Err(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                n_features
            ));
        }
        if let Some(name) = self.encoders.keys().find(|k| !self.feature_names.contains(k)) {
            return Err(format!("encoder for unknown feature '{name}'"));
        }
        if self.trees.is_empty() {
            return Err("model has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }

    /// Mean probability of "satisfied" over the forest
    pub fn probability(&self, row: &[f64]) -> crate::Result<f64> {
        if row.len() != self.feature_names.len() {
            return Err(Error::ModelInference {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        let total: f64 = self.trees.iter().map(|t| t.probability(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict_row(&self, row: &[f64]) -> crate::Result<Satisfaction> {
        Ok(if self.probability(row)? > 0.5 {
            Satisfaction::Satisfied
        } else {
            Satisfaction::NeutralOrDissatisfied
        })
    }

    /// Feature rows in `feature_names` order, one per table row
    ///
    /// Categorical features go through the model's encoders; empty delay
    /// cells count as zero minutes.
    pub fn feature_rows(&self, table: &PassengerTable) -> crate::Result<Vec<Vec<f64>>> {
        let names: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
        table.require_columns(&names)?;

        let mut rows = vec![Vec::with_capacity(names.len()); table.len()];
        for &name in &names {
            let values = match self.encoders.get(name) {
                Some(encoder) => table
                    .str_column(name)?
                    .into_iter()
                    .map(|v| {
                        encoder
                            .transform(v)
                            .map(|c| c as f64)
                            .ok_or_else(|| Error::encoding(name, v))
                    })
                    .collect::<crate::Result<Vec<f64>>>()?,
                None if name == DEPARTURE_DELAY || name == ARRIVAL_DELAY => {
                    table.numeric_column_or(name, 0.0)?
                }
                None => table.numeric_column(name)?,
            };
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(rows)
    }

    pub fn predict_table(&self, table: &PassengerTable) -> crate::Result<SatisfactionPredictions> {
        let predictions = self
            .feature_rows(table)?
            .iter()
            .map(|row| self.predict_row(row))
            .collect::<crate::Result<Vec<_>>>()?;

        let result = SatisfactionPredictions { predictions };
        let (satisfied, other) = result.counts();
        info!("Predicted {} satisfied, {} neutral or dissatisfied", satisfied, other);
        Ok(result)
    }

    /// Value a feature takes in manual entry when the user leaves it unset
    ///
    /// Categoricals take the first class of their encoder, service ratings
    /// the middle of the scale.
    fn manual_default(&self, feature: &str) -> String {
        if let Some(encoder) = self.encoders.get(feature) {
            return encoder.classes().first().cloned().unwrap_or_default();
        }
        match feature {
            AGE => "35".to_string(),
            FLIGHT_DISTANCE => "1000".to_string(),
            f if SERVICE_COLUMNS.contains(&f) => "3".to_string(),
            _ => "0".to_string(),
        }
    }

    /// A one-row table in `feature_names` order for a manually entered passenger
    ///
    /// # Arguments
    /// * `values` - Raw values keyed by feature name; unset features take defaults
    ///
    /// # Returns
    /// * The table, or `InvalidParameter` when a key is not a model feature
    pub fn manual_table(&self, values: &BTreeMap<String, String>) -> crate::Result<PassengerTable> {
        if let Some(name) = values.keys().find(|k| !self.feature_names.contains(k)) {
            return Err(Error::InvalidParameter {
                name: "feature",
                value: name.clone(),
                reason: "not a feature of the satisfaction model",
            });
        }

        let row = self
            .feature_names
            .iter()
            .map(|name| {
                values
                    .get(name)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_else(|| self.manual_default(name))
            })
            .collect();
        PassengerTable::new(self.feature_names.clone(), vec![row])
    }

    /// Predict one manually entered passenger
    pub fn predict_manual(&self, values: &BTreeMap<String, String>) -> crate::Result<Satisfaction> {
        let table = self.manual_table(values)?;
        let predictions = self.predict_table(&table)?;
        predictions
            .predictions
            .first()
            .copied()
            .ok_or(Error::InsufficientData { rows: 0, required: 1 })
    }

    /// Features ranked by importance, highest first
    pub fn ranked_importances(&self, limit: usize) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(self.feature_importances.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatisfactionPredictions {
    pub predictions: Vec<Satisfaction>,
}

impl SatisfactionPredictions {
    /// `(satisfied, neutral or dissatisfied)`
    pub fn counts(&self) -> (usize, usize) {
        let satisfied = self
            .predictions
            .iter()
            .filter(|&&p| p == Satisfaction::Satisfied)
            .count();
        (satisfied, self.predictions.len() - satisfied)
    }

    /// The input table with the prediction code and label columns set
    pub fn annotate(&self, table: &PassengerTable) -> PassengerTable {
        let mut annotated = table.clone();
        annotated.set_column(
            PREDICTED_COLUMN,
            self.predictions.iter().map(|p| p.code().to_string()).collect(),
        );
        annotated.set_column(
            PREDICTED_LABEL_COLUMN,
            self.predictions.iter().map(|p| p.label().to_string()).collect(),
        );
        annotated
    }
}
