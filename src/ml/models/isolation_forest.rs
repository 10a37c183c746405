//! Isolation Forest implementation
//!
//! Anomaly detection using isolation trees. Anomalies are easier to isolate
//! and thus have shorter path lengths in the trees.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::AnomalyModel;
use crate::config::ForestConfig;

/// Isolation Forest model for anomaly detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Individual isolation trees
    trees: Vec<IsolationTree>,
    /// Number of trees
    num_trees: usize,
    /// Sample size for each tree
    sample_size: usize,
    /// Random seed used for training
    seed: u64,
    /// Average path length normalization factor
    avg_path_length: f64,
    /// Whether the model is trained
    trained: bool,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl IsolationForest {
    /// Create a new Isolation Forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            trees: Vec::new(),
            num_trees: config.num_trees,
            sample_size: config.sample_size,
            seed: config.seed,
            avg_path_length: 0.0,
            trained: false,
        }
    }

    /// Create with custom parameters
    pub fn with_params(num_trees: usize, sample_size: usize, seed: u64) -> Self {
        Self {
            trees: Vec::new(),
            num_trees,
            sample_size,
            seed,
            avg_path_length: 0.0,
            trained: false,
        }
    }

    /// Calculate average path length for normalization (c(n) function)
    fn average_path_length(n: usize) -> f64 {
        if n <= 1 {
            return 0.0;
        }
        let n = n as f64;
        2.0 * (n.ln() + 0.577_215_664_9) - 2.0 * (n - 1.0) / n
    }

    /// Score a single sample
    fn score_sample(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() || self.avg_path_length == 0.0 {
            return 0.5;
        }

        let total_path_length: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum();

        let avg_path = total_path_length / self.trees.len() as f64;

        // Anomaly score: 2^(-avg_path / c(sample_size))
        2.0_f64.powf(-avg_path / self.avg_path_length)
    }
}

impl AnomalyModel for IsolationForest {
    fn fit(&mut self, data: &[Vec<f64>]) {
        if data.is_empty() {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_features = data[0].len();
        let sample_size = self.sample_size.min(data.len()).max(2);

        self.trees.clear();
        self.avg_path_length = Self::average_path_length(sample_size);

        for _ in 0..self.num_trees {
            // Sample with replacement
            let sample: Vec<Vec<f64>> = (0..sample_size)
                .map(|_| {
                    let i = rng.random_range(0..data.len());
                    data[i].clone()
                })
                .collect();

            // Build tree
            let max_depth = (sample_size as f64).log2().ceil() as usize;
            let tree = IsolationTree::build(&sample, n_features, max_depth, &mut rng);
            self.trees.push(tree);
        }

        self.trained = true;
    }

    fn score(&self, sample: &[f64]) -> f64 {
        self.score_sample(sample)
    }

    fn name(&self) -> &str {
        "IsolationForest"
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// A single isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    root: Option<Box<IsolationNode>>,
}

impl IsolationTree {
    /// Build an isolation tree from samples
    fn build<R: Rng>(
        samples: &[Vec<f64>],
        n_features: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let root = Self::build_node(samples, n_features, 0, max_depth, rng);
        Self { root }
    }

    /// Recursively build tree nodes
    fn build_node<R: Rng>(
        samples: &[Vec<f64>],
        n_features: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Option<Box<IsolationNode>> {
        if samples.is_empty() {
            return None;
        }

        // Terminal conditions
        if depth >= max_depth || samples.len() <= 1 {
            return Some(Box::new(IsolationNode::Leaf {
                size: samples.len(),
            }));
        }

        // Randomly select feature
        let feature_idx = rng.random_range(0..n_features);

        // Find min/max for selected feature
        let mut min_val = f64::MAX;
        let mut max_val = f64::MIN;
        for sample in samples {
            if let Some(&val) = sample.get(feature_idx) {
                if val < min_val {
                    min_val = val;
                }
                if val > max_val {
                    max_val = val;
                }
            }
        }

        // If all values are the same, make a leaf
        if (max_val - min_val).abs() < f64::EPSILON {
            return Some(Box::new(IsolationNode::Leaf {
                size: samples.len(),
            }));
        }

        // Random split point
        let split_value = rng.random_range(min_val..max_val);

        // Partition samples
        let (left_samples, right_samples): (Vec<Vec<f64>>, Vec<Vec<f64>>) = samples
            .iter()
            .cloned()
            .partition(|s| s.get(feature_idx).map(|&v| v < split_value).unwrap_or(true));

        // Build child nodes
        let left = Self::build_node(&left_samples, n_features, depth + 1, max_depth, rng);
        let right = Self::build_node(&right_samples, n_features, depth + 1, max_depth, rng);

        Some(Box::new(IsolationNode::Internal {
            feature_idx,
            split_value,
            left,
            right,
        }))
    }

    /// Calculate path length for a sample
    fn path_length(&self, sample: &[f64]) -> f64 {
        match &self.root {
            None => 0.0,
            Some(node) => Self::node_path_length(node, sample, 0),
        }
    }

    fn node_path_length(node: &IsolationNode, sample: &[f64], depth: usize) -> f64 {
        match node {
            IsolationNode::Leaf { size } => {
                // Add expected path length adjustment for leaves with multiple samples
                depth as f64 + IsolationForest::average_path_length(*size)
            }
            IsolationNode::Internal {
                feature_idx,
                split_value,
                left,
                right,
            } => {
                let val = sample.get(*feature_idx).copied().unwrap_or(0.0);
                let next_node = if val < *split_value { left } else { right };

                match next_node {
                    Some(n) => Self::node_path_length(n, sample, depth + 1),
                    None => depth as f64 + 1.0,
                }
            }
        }
    }
}

/// Node in an isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    /// Internal node with split
    Internal {
        feature_idx: usize,
        split_value: f64,
        left: Option<Box<IsolationNode>>,
        right: Option<Box<IsolationNode>>,
    },
    /// Leaf node
    Leaf { size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varied_population(n: usize, dims: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                // Values vary between -1 and 1
                let value = ((i % 21) as f64 - 10.0) / 10.0;
                vec![value; dims]
            })
            .collect()
    }

    #[test]
    fn test_isolation_forest_creation() {
        let forest = IsolationForest::default();
        assert!(!forest.is_trained());
        assert_eq!(forest.name(), "IsolationForest");
    }

    #[test]
    fn test_isolation_forest_training() {
        let mut forest = IsolationForest::with_params(10, 32, 42);
        forest.fit(&varied_population(100, 10));

        assert!(forest.is_trained());
        assert_eq!(forest.trees.len(), 10);
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let mut forest = IsolationForest::with_params(50, 64, 42);
        forest.fit(&varied_population(200, 10));

        let inlier_score = forest.score(&vec![0.0; 10]);
        let outlier_score = forest.score(&vec![25.0; 10]);

        assert!(inlier_score >= 0.0 && inlier_score <= 1.0);
        assert!(outlier_score >= 0.0 && outlier_score <= 1.0);
        assert!(
            outlier_score > inlier_score,
            "outlier {} should exceed inlier {}",
            outlier_score,
            inlier_score
        );
    }

    #[test]
    fn test_training_is_deterministic() {
        let data = varied_population(150, 8);

        let mut a = IsolationForest::with_params(20, 32, 7);
        let mut b = IsolationForest::with_params(20, 32, 7);
        a.fit(&data);
        b.fit(&data);

        let sample = vec![0.35; 8];
        assert_eq!(a.score(&sample), b.score(&sample));
    }

    #[test]
    fn test_average_path_length() {
        // c(1) should be 0
        assert_eq!(IsolationForest::average_path_length(1), 0.0);

        // c(n) should increase with n
        let c_10 = IsolationForest::average_path_length(10);
        let c_100 = IsolationForest::average_path_length(100);
        assert!(c_100 > c_10, "c(100)={} should be > c(10)={}", c_100, c_10);
    }
}
