//! Isolation Forest scoring
//!
//! Each tree isolates a random subsample by splitting on a random feature at a
//! random point between that feature's bounds. Outliers are isolated after
//! fewer splits, so their average path length over the forest is short.

use super::{OutlierScorer, MIN_ROWS};
use crate::error::Error;
use log::debug;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the row count
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &Array2<f64>, rows: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(data, rows, 0, height_limit, rng);
        tree
    }

    fn build(
        &mut self,
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });
        if depth >= height_limit || rows.len() <= 1 {
            return idx;
        }

        // features that still vary inside this node
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data[[r, feature]];
                    (lo.min(v), hi.max(v))
                });
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return idx;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[[r, feature]] <= threshold);

        let left = self.build(data, left_rows, depth + 1, height_limit, rng);
        let right = self.build(data, right_rows, depth + 1, height_limit, rng);
        self.nodes[idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn path_length(&self, point: &ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree of `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl OutlierScorer for IsolationForest {
    /// Negated anomaly score `2^(-E[h(x)] / c(psi))`, so lower is more anomalous
    fn score_samples(&self, features: &Array2<f64>) -> crate::Result<Vec<f64>> {
        let n_rows = features.nrows();
        if n_rows < MIN_ROWS {
            return Err(Error::InsufficientData {
                rows: n_rows,
                required: MIN_ROWS,
            });
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "n_estimators/max_samples",
                value: format!("{}/{}", self.n_estimators, self.max_samples),
                reason: "both must be positive",
            });
        }

        let sample_size = self.max_samples.min(n_rows).max(MIN_ROWS);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        debug!(
            "Isolation forest: {} trees, {} samples each, height limit {}",
            self.n_estimators, sample_size, height_limit
        );

        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees: Vec<IsolationTree> = (0..self.n_estimators)
            .map(|_| {
                let rows = index::sample(&mut rng, n_rows, sample_size).into_vec();
                IsolationTree::grow(features, rows, height_limit, &mut rng)
            })
            .collect();

        let normaliser = average_path_length(sample_size);
        let scores = features
            .outer_iter()
            .map(|point| {
                let mean_path = trees.iter().map(|t| t.path_length(&point)).sum::<f64>() / trees.len() as f64;
                -(2f64.powf(-mean_path / normaliser))
            })
            .collect();

        Ok(scores)
    }
}
