//! Per-cluster service means and improvement recommendations

use crate::data::{ServiceRatings, SERVICE_COLUMNS};
use crate::model::ClusterId;
use serde::Serialize;
use std::fmt;

/// How many services a recommendation names
pub const RECOMMENDATION_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceScore {
    pub service: &'static str,
    pub mean: f64,
}

/// Services a cluster's passengers rate lowest, weakest first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    /// No rated passengers to average over
    NoPassengers,
    Improve { services: Vec<ServiceScore> },
}

impl Recommendation {
    pub fn services(&self) -> &[ServiceScore] {
        match self {
            Self::NoPassengers => &[],
            Self::Improve { services } => services.as_slice(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoPassengers)
    }
}

/// Mean of every service column across the given passengers, `None` when there are none
pub fn service_means<'a, I>(ratings: I) -> Option<Vec<ServiceScore>>
where
    I: IntoIterator<Item = &'a ServiceRatings>,
{
    let mut sums = [0.0f64; SERVICE_COLUMNS.len()];
    let mut count = 0usize;
    for rating in ratings {
        for (sum, &value) in sums.iter_mut().zip(rating.values().iter()) {
            *sum += f64::from(value);
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    Some(
        SERVICE_COLUMNS
            .iter()
            .zip(sums.iter())
            .map(|(&service, &sum)| ServiceScore {
                service,
                mean: sum / count as f64,
            })
            .collect(),
    )
}

/// The five lowest-mean services, ascending
pub fn recommend<'a, I>(ratings: I) -> Recommendation
where
    I: IntoIterator<Item = &'a ServiceRatings>,
{
    match service_means(ratings) {
        None => Recommendation::NoPassengers,
        Some(mut means) => {
            means.sort_by(|a, b| a.mean.total_cmp(&b.mean));
            means.truncate(RECOMMENDATION_SIZE);
            Recommendation::Improve { services: means }
        }
    }
}

/// The five highest-mean services, descending
pub fn strongest_services<'a, I>(ratings: I) -> Vec<ServiceScore>
where
    I: IntoIterator<Item = &'a ServiceRatings>,
{
    let mut means = service_means(ratings).unwrap_or_default();
    means.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    means.truncate(RECOMMENDATION_SIZE);
    means
}

/// A recommendation labelled with the cluster it was computed for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecommendation {
    pub cluster: ClusterId,
    pub passengers: usize,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

impl fmt::Display for ClusterRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recommendation {
            Recommendation::NoPassengers => {
                write!(f, "No rated passengers found in Cluster {}.", self.cluster)
            }
            Recommendation::Improve { services } => {
                writeln!(
                    f,
                    "Cluster {} ({} passengers): the airline should improve these services:",
                    self.cluster, self.passengers
                )?;
                for (i, score) in services.iter().enumerate() {
                    writeln!(f, "  {}. {} (avg. score {:.2})", i + 1, score.service, score.mean)?;
                }
                Ok(())
            }
        }
    }
}
