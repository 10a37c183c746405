//! K-means clustering component
//!
//! Lloyd's algorithm over standardized fingerprints. The anomaly signal for a
//! point is its distance to the nearest learned centroid, normalized by that
//! cluster's intra-cluster spread.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::AnomalyModel;
use crate::config::KMeansConfig;

const SPREAD_EPSILON: f64 = 1e-9;

/// Intra-cluster distance statistics for one centroid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSpread {
    /// Mean member distance to the centroid
    pub mean: f64,
    /// Population std-dev of member distances
    pub std: f64,
    /// Number of members assigned during training
    pub size: usize,
}

/// K-means model with per-cluster spread statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    centroids: Vec<Vec<f64>>,
    spreads: Vec<ClusterSpread>,
    clusters: usize,
    max_iters: usize,
    seed: u64,
    trained: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(KMeansConfig::default())
    }
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            centroids: Vec::new(),
            spreads: Vec::new(),
            clusters: config.clusters,
            max_iters: config.max_iters,
            seed: config.seed,
            trained: false,
        }
    }

    pub fn with_params(clusters: usize, max_iters: usize, seed: u64) -> Self {
        Self {
            centroids: Vec::new(),
            spreads: Vec::new(),
            clusters,
            max_iters,
            seed,
            trained: false,
        }
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    pub fn spreads(&self) -> &[ClusterSpread] {
        &self.spreads
    }

    /// Index and distance of the nearest centroid
    pub fn nearest(&self, sample: &[f64]) -> Option<(usize, f64)> {
        self.centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, euclidean(sample, c)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn assign(&self, data: &[Vec<f64>]) -> Vec<usize> {
        data.iter()
            .map(|s| self.nearest(s).map(|(i, _)| i).unwrap_or(0))
            .collect()
    }
}

impl AnomalyModel for KMeans {
    fn fit(&mut self, data: &[Vec<f64>]) {
        if data.is_empty() {
            return;
        }

        let k = self.clusters.min(data.len()).max(1);
        let n_features = data[0].len();
        let mut rng = StdRng::seed_from_u64(self.seed);

        // Initialize centroids from distinct sample points
        let picks = rand::seq::index::sample(&mut rng, data.len(), k);
        self.centroids = picks.iter().map(|i| data[i].clone()).collect();

        let mut assignments = self.assign(data);

        for _ in 0..self.max_iters {
            // Recompute centroids as member means; empty clusters keep their centroid
            let mut sums = vec![vec![0.0; n_features]; k];
            let mut counts = vec![0usize; k];
            for (sample, &cluster) in data.iter().zip(assignments.iter()) {
                counts[cluster] += 1;
                for (acc, &v) in sums[cluster].iter_mut().zip(sample.iter()) {
                    *acc += v;
                }
            }
            for (cluster, count) in counts.iter().enumerate() {
                if *count > 0 {
                    self.centroids[cluster] = sums[cluster]
                        .iter()
                        .map(|s| s / *count as f64)
                        .collect();
                }
            }

            let next = self.assign(data);
            if next == assignments {
                break;
            }
            assignments = next;
        }

        // Intra-cluster distance statistics for score normalization
        let mut distances: Vec<Vec<f64>> = vec![Vec::new(); k];
        for (sample, &cluster) in data.iter().zip(assignments.iter()) {
            distances[cluster].push(euclidean(sample, &self.centroids[cluster]));
        }
        self.spreads = distances
            .iter()
            .map(|ds| {
                if ds.is_empty() {
                    return ClusterSpread::default();
                }
                let mean = ds.iter().sum::<f64>() / ds.len() as f64;
                let var = ds.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / ds.len() as f64;
                ClusterSpread {
                    mean,
                    std: var.sqrt(),
                    size: ds.len(),
                }
            })
            .collect();

        self.trained = true;
    }

    fn score(&self, sample: &[f64]) -> f64 {
        let (cluster, distance) = match self.nearest(sample) {
            Some(found) => found,
            None => return 0.0,
        };

        let spread = &self.spreads[cluster];
        let scale = (spread.mean + 3.0 * spread.std).max(SPREAD_EPSILON);
        (distance / scale).min(1.0)
    }

    fn name(&self) -> &str {
        "KMeans"
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
