//! Pretrained clustering model and cluster assignment

use crate::encoding::EncodedFeatureVector;
use crate::error::Error;
use ndarray::{Array2, ArrayView1};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub type ClusterId = usize;

/// On-disk form of the clustering artifact
#[derive(Debug, Deserialize)]
struct ClusterModelFile {
    centroids: Vec<Vec<f64>>,
}

/// Fitted K-Means centroids; assignment is a nearest-centroid lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    /// Cluster centroids, one row per cluster
    pub centroids: Array2<f64>,
}

impl ClusterModel {
    pub fn from_centroids(rows: Vec<Vec<f64>>) -> crate::Result<Self> {
        Self::build(rows).map_err(|reason| Error::artifact("<cluster model>", reason))
    }

    /// Load and validate a JSON cluster model artifact
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::artifact(path, e.to_string()))?;
        let file: ClusterModelFile =
            serde_json::from_str(&text).map_err(|e| Error::artifact(path, e.to_string()))?;
        Self::build(file.centroids).map_err(|reason| Error::artifact(path, reason))
    }

    fn build(rows: Vec<Vec<f64>>) -> Result<Self, String> {
        let n_clusters = rows.len();
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        if n_clusters == 0 || n_features == 0 {
            return Err("model has no centroids".to_string());
        }
        if let Some(i) = rows.iter().position(|r| r.len() != n_features) {
            return Err(format!(
                "centroid {} has {} values, expected {}",
                i,
                rows[i].len(),
                n_features
            ));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err("centroids contain non-finite values".to_string());
        }

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let centroids =
            Array2::from_shape_vec((n_clusters, n_features), flat).map_err(|e| e.to_string())?;
        Ok(Self { centroids })
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    /// Predict the cluster for a raw feature slice
    ///
    /// Ties go to the lowest cluster index.
    pub fn predict(&self, features: &[f64]) -> crate::Result<ClusterId> {
        if features.len() != self.n_features() {
            return Err(Error::ModelInference {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let point = ArrayView1::from(features);
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = squared_distance(&point, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Assign an encoded passenger to its cluster
    pub fn assign(&self, vector: &EncodedFeatureVector) -> crate::Result<ClusterId> {
        self.predict(&vector.features())
    }
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
