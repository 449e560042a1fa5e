//! Categorical encoders and the passenger feature encoder

use crate::data::{PassengerRecord, CLASS, CUSTOMER_TYPE, TRAVEL_TYPE};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

pub const AGE_GROUP: &str = "AgeGroup";
pub const FLIGHT_CATEGORY: &str = "FlightCategory";

/// Encoded feature order expected by the clustering model
pub const CLUSTER_FEATURES: [&str; 5] = [CUSTOMER_TYPE, TRAVEL_TYPE, CLASS, AGE_GROUP, FLIGHT_CATEGORY];

/// Fitted mapping between a closed vocabulary and contiguous integer codes
///
/// The code of a class is its position in the class list. Serialized as the
/// bare class list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategoricalEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl CategoricalEncoder {
    /// Fit on observed values: the vocabulary is the sorted set of distinct values
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        let classes: Vec<String> = distinct.into_iter().collect();
        let index = classes.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect();
        Self { classes, index }
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TryFrom<Vec<String>> for CategoricalEncoder {
    type Error = String;

    fn try_from(classes: Vec<String>) -> Result<Self, Self::Error> {
        if classes.is_empty() {
            return Err("encoder vocabulary is empty".to_string());
        }
        let mut index = HashMap::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), i).is_some() {
                return Err(format!("duplicate class {class:?} in encoder vocabulary"));
            }
        }
        Ok(Self { classes, index })
    }
}

impl From<CategoricalEncoder> for Vec<String> {
    fn from(encoder: CategoricalEncoder) -> Self {
        encoder.classes
    }
}

/// Named encoders plus the median flight distance they were fitted alongside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderBundle {
    pub encoders: BTreeMap<String, CategoricalEncoder>,
    pub median_distance: f64,
}

impl EncoderBundle {
    pub fn new(encoders: BTreeMap<String, CategoricalEncoder>, median_distance: f64) -> crate::Result<Self> {
        let bundle = Self {
            encoders,
            median_distance,
        };
        bundle
            .validate()
            .map_err(|reason| Error::artifact("<encoder bundle>", reason))?;
        Ok(bundle)
    }

    /// Load and validate a JSON encoder bundle
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::artifact(path, e.to_string()))?;
        let bundle: Self = serde_json::from_str(&text).map_err(|e| Error::artifact(path, e.to_string()))?;
        bundle.validate().map_err(|reason| Error::artifact(path, reason))?;
        Ok(bundle)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(field) = CLUSTER_FEATURES.iter().find(|f| !self.encoders.contains_key(**f)) {
            return Err(format!("no encoder for field '{field}'"));
        }
        if !self.median_distance.is_finite() {
            return Err(format!("median_distance {} is not finite", self.median_distance));
        }
        Ok(())
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(field)
    }

    /// Code for `value` under the encoder fitted for `field`
    pub fn transform(&self, field: &str, value: &str) -> crate::Result<usize> {
        let encoder = self
            .encoder(field)
            .ok_or_else(|| Error::artifact("<encoder bundle>", format!("no encoder for field '{field}'")))?;
        encoder
            .transform(value)
            .ok_or_else(|| Error::encoding(field, value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeGroup {
    Young,
    MiddleAged,
    Old,
}

impl AgeGroup {
    /// Young up to 30, middle-aged up to 55, old beyond
    pub fn from_age(age: f64) -> Self {
        if age <= 30.0 {
            Self::Young
        } else if age <= 55.0 {
            Self::MiddleAged
        } else {
            Self::Old
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Young => "Young",
            Self::MiddleAged => "Middle-aged",
            Self::Old => "Old",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightCategory {
    Short,
    Long,
}

impl FlightCategory {
    /// Short when at or below the training-time median distance
    pub fn from_distance(distance: f64, median: f64) -> Self {
        if distance <= median {
            Self::Short
        } else {
            Self::Long
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Short => "Short",
            Self::Long => "Long",
        }
    }
}

impl fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Integer codes in [`CLUSTER_FEATURES`] order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedFeatureVector {
    pub codes: [usize; 5],
}

impl EncodedFeatureVector {
    pub fn features(&self) -> Vec<f64> {
        self.codes.iter().map(|&c| c as f64).collect()
    }
}

/// Projects passenger records onto the clustering feature space
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder<'a> {
    bundle: &'a EncoderBundle,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(bundle: &'a EncoderBundle) -> Self {
        Self { bundle }
    }

    pub fn buckets(&self, record: &PassengerRecord) -> (AgeGroup, FlightCategory) {
        (
            AgeGroup::from_age(record.age),
            FlightCategory::from_distance(record.flight_distance, self.bundle.median_distance),
        )
    }

    /// Fails on the first categorical value outside its encoder's vocabulary
    pub fn encode(&self, record: &PassengerRecord) -> crate::Result<EncodedFeatureVector> {
        let (age_group, flight_category) = self.buckets(record);
        let codes = [
            self.bundle.transform(CUSTOMER_TYPE, &record.customer_type)?,
            self.bundle.transform(TRAVEL_TYPE, &record.travel_type)?,
            self.bundle.transform(CLASS, &record.class)?,
            self.bundle.transform(AGE_GROUP, age_group.label())?,
            self.bundle.transform(FLIGHT_CATEGORY, flight_category.label())?,
        ];
        Ok(EncodedFeatureVector { codes })
    }
}
