use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forest: ForestConfig,

    #[serde(default)]
    pub kmeans: KMeansConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub explain: ExplainConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Override the model storage directory
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.storage.data_dir = path.as_ref().to_path_buf();
        self
    }
}

/// Isolation forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of randomized partition trees
    pub num_trees: usize,
    /// Subsample size for each tree
    pub sample_size: usize,
    /// Random seed for reproducible training
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: 64,
            seed: 42,
        }
    }
}

/// K-means configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Number of cluster centroids
    pub clusters: usize,
    /// Maximum Lloyd iterations
    pub max_iters: usize,
    /// Random seed for centroid initialization
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            clusters: 5,
            max_iters: 100,
            seed: 42,
        }
    }
}

/// Ensemble blending and calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the isolation-forest term
    pub forest_weight: f64,
    /// Weight of the cluster-distance term
    pub cluster_weight: f64,
    /// Steepness of the logistic calibration curve
    pub temperature: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            forest_weight: 0.6,
            cluster_weight: 0.4,
            temperature: 1.5,
        }
    }
}

/// Shapley attribution sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Number of feature permutations to sample
    pub permutations: usize,
    /// How many top contributions a report carries
    pub top_k: usize,
    /// Sampling deadline; on expiry the running estimate is returned
    pub time_budget_ms: u64,
    /// Random seed for reproducible attributions
    pub seed: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            permutations: 32,
            top_k: 5,
            time_budget_ms: 250,
            seed: 7,
        }
    }
}

/// Minimum training population bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Minimum total feature vectors
    pub min_vectors: usize,
    /// Minimum distinct entities across the population
    pub min_entities: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_vectors: 10,
            min_entities: 2,
        }
    }
}

/// Model artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding versioned model artifacts
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/insidermon/models"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.forest.num_trees, 100);
        assert_eq!(config.kmeans.clusters, 5);
        assert_eq!(config.scoring.forest_weight, 0.6);
        assert_eq!(config.scoring.cluster_weight, 0.4);
        assert_eq!(config.explain.top_k, 5);
        assert_eq!(config.training.min_vectors, 10);
        assert_eq!(config.training.min_entities, 2);
    }

    #[test]
    fn test_config_parse_partial() {
        let config: Config = toml::from_str(
            r#"
            [forest]
            num_trees = 50
            sample_size = 32
            seed = 1

            [scoring]
            forest_weight = 0.7
            cluster_weight = 0.3
            temperature = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.forest.num_trees, 50);
        assert_eq!(config.scoring.forest_weight, 0.7);
        // Unspecified sections fall back to defaults
        assert_eq!(config.kmeans.clusters, 5);
        assert_eq!(config.explain.permutations, 32);
    }
}
