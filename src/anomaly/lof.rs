//! Local Outlier Factor scoring

use super::{OutlierScorer, MIN_ROWS};
use crate::error::Error;
use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use log::{debug, warn};
use ndarray::Array2;

/// Keeps reachability densities finite when neighbours coincide
const DENSITY_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutlierFactor {
    pub n_neighbors: usize,
}

impl Default for LocalOutlierFactor {
    fn default() -> Self {
        Self { n_neighbors: 20 }
    }
}

impl LocalOutlierFactor {
    /// Neighbour count actually used for `n_rows` rows: `min(n_neighbors, n_rows - 1)`
    pub fn effective_neighbors(&self, n_rows: usize) -> usize {
        self.n_neighbors.min(n_rows.saturating_sub(1))
    }

    /// For every row, its k nearest other rows as `(row, distance)`, nearest first
    fn neighbourhoods(&self, features: &Array2<f64>, k: usize) -> crate::Result<Vec<Vec<(usize, f64)>>> {
        let index = CommonNearestNeighbour::BallTree
            .from_batch(features, L2Dist)
            .map_err(|e| Error::NeighborSearch(e.to_string()))?;

        features
            .outer_iter()
            .enumerate()
            .map(|(i, point)| {
                let mut hits = index
                    .k_nearest(point.view(), k + 1)
                    .map_err(|e| Error::NeighborSearch(e.to_string()))?;
                // the query point finds itself; with duplicates it may be crowded out
                match hits.iter().position(|(_, j)| *j == i) {
                    Some(pos) => {
                        hits.remove(pos);
                    }
                    None => hits.truncate(k),
                }

                let mut neighbours: Vec<(usize, f64)> = hits
                    .into_iter()
                    .map(|(other, j)| (j, L2Dist.distance(point.view(), other)))
                    .collect();
                neighbours.sort_by(|a, b| a.1.total_cmp(&b.1));
                neighbours.truncate(k);
                Ok(neighbours)
            })
            .collect()
    }
}

impl OutlierScorer for LocalOutlierFactor {
    /// Negated local outlier factor; inliers sit near -1, outliers well below
    fn score_samples(&self, features: &Array2<f64>) -> crate::Result<Vec<f64>> {
        let n_rows = features.nrows();
        if n_rows < MIN_ROWS {
            return Err(Error::InsufficientData {
                rows: n_rows,
                required: MIN_ROWS,
            });
        }
        if self.n_neighbors == 0 {
            return Err(Error::InvalidParameter {
                name: "n_neighbors",
                value: "0".to_string(),
                reason: "must be positive",
            });
        }

        let k = self.effective_neighbors(n_rows);
        if k < self.n_neighbors {
            warn!(
                "Only {} rows: using {} neighbours instead of {}",
                n_rows, k, self.n_neighbors
            );
        }
        debug!("Local outlier factor with {} neighbours", k);

        let neighbourhoods = self.neighbourhoods(features, k)?;
        let k_distance: Vec<f64> = neighbourhoods
            .iter()
            .map(|nb| nb.last().map(|&(_, d)| d).unwrap_or(0.0))
            .collect();

        let density: Vec<f64> = neighbourhoods
            .iter()
            .map(|nb| {
                let reach = nb.iter().map(|&(j, d)| d.max(k_distance[j])).sum::<f64>() / nb.len() as f64;
                1.0 / (reach + DENSITY_EPSILON)
            })
            .collect();

        let scores = neighbourhoods
            .iter()
            .enumerate()
            .map(|(i, nb)| {
                let neighbour_density = nb.iter().map(|&(j, _)| density[j]).sum::<f64>() / nb.len() as f64;
                -(neighbour_density / density[i])
            })
            .collect();

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Array2<f64> {
        let mut values = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                values.extend_from_slice(&[i as f64, j as f64]);
            }
        }
        values.extend_from_slice(&[40.0, 40.0]);
        Array2::from_shape_vec((37, 2), values).unwrap()
    }

    #[test]
    fn test_outlier_has_lowest_score() {
        let data = cluster_with_outlier();
        let scores = LocalOutlierFactor::default().score_samples(&data).unwrap();
        let (lowest, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(lowest, 36);
        assert!(scores[36] < -2.0);
    }

    #[test]
    fn test_uniform_points_score_near_one() {
        let data = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let scores = LocalOutlierFactor { n_neighbors: 2 }.score_samples(&data).unwrap();
        assert!(scores.iter().all(|&s| s < 0.0 && s > -2.0));
    }

    #[test]
    fn test_neighbour_count_clamped() {
        let lof = LocalOutlierFactor::default();
        assert_eq!(lof.effective_neighbors(5), 4);
        assert_eq!(lof.effective_neighbors(500), 20);

        let data = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 3.0, 50.0]).unwrap();
        let scores = lof.score_samples(&data).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_duplicates_stay_finite() {
        let data = Array2::from_elem((8, 2), 3.0);
        let scores = LocalOutlierFactor { n_neighbors: 3 }.score_samples(&data).unwrap();
        assert!(scores.iter().all(|&s| (s + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_single_row_rejected() {
        let data = Array2::from_elem((1, 2), 0.0);
        assert!(matches!(
            LocalOutlierFactor::default().score_samples(&data),
            Err(Error::InsufficientData { rows: 1, required: 2 })
        ));
    }
}
