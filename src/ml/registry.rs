//! Model lifecycle management
//!
//! Fits the ensemble over a training population, persists a versioned
//! artifact, and publishes it with a single atomic swap. Scoring reads the
//! active artifact through an `Arc` snapshot, so in-flight requests keep the
//! version they started with while training publishes the next one.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::baseline::Scaler;
use super::features::{FeatureVector, FEATURE_NAMES, NUM_FEATURES, SCHEMA_VERSION};
use super::models::{AnomalyModel, IsolationForest, KMeans};
use super::scoring::Calibration;
use super::storage::ModelStorage;
use crate::config::Config;
use crate::error::{CoreError, Result};

/// Immutable trained model bundle. Superseded by the next training pass,
/// never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub scaler: Scaler,
    pub forest: IsolationForest,
    pub kmeans: KMeans,
    pub calibration: Calibration,
    pub sample_count: u64,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            version: self.version,
            schema_version: self.schema_version,
            sample_count: self.sample_count,
            trained_at: self.trained_at,
        }
    }

    /// Reject vectors whose dimensionality or schema tag differs from what
    /// this artifact was trained on
    pub fn check_schema(&self, vector: &FeatureVector) -> Result<()> {
        if vector.values.len() != self.feature_names.len()
            || vector.schema_version != self.schema_version
        {
            return Err(CoreError::FeatureSchemaMismatch {
                expected: self.feature_names.len(),
                got: vector.values.len(),
                expected_schema: self.schema_version,
                got_schema: vector.schema_version,
            });
        }
        Ok(())
    }
}

/// Lightweight artifact descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: u32,
    pub schema_version: u32,
    pub sample_count: u64,
    pub trained_at: DateTime<Utc>,
}

/// Versioned model store with one active artifact
pub struct ModelRegistry {
    config: Config,
    storage: ModelStorage,
    active: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelRegistry {
    /// Open the registry, restoring the active artifact from storage if one
    /// was published by an earlier run
    pub fn new(config: Config) -> Result<Self> {
        let storage = ModelStorage::new(&config.storage.data_dir);
        storage.init()?;

        let active = match storage.load_active() {
            Ok(Some(artifact)) => {
                info!(
                    "Restored active model v{} ({} samples)",
                    artifact.version, artifact.sample_count
                );
                Some(Arc::new(artifact))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to restore active model: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            storage,
            active: RwLock::new(active),
        })
    }

    /// Snapshot of the currently active artifact
    pub fn active(&self) -> Option<Arc<ModelArtifact>> {
        self.active.read().clone()
    }

    /// Metadata of the active artifact without refitting
    pub fn model_info(&self) -> Result<ModelMetadata> {
        self.active()
            .map(|a| a.metadata())
            .ok_or(CoreError::ModelNotTrained)
    }

    /// Load a historical artifact by version (for attributing anomalies
    /// recorded under older models)
    pub fn load_version(&self, version: u32) -> Result<Option<ModelArtifact>> {
        self.storage.load_version(version)
    }

    /// Fit the ensemble on a training population and activate the result.
    ///
    /// A failed pass returns before anything is persisted or swapped, so the
    /// previously active artifact stays untouched.
    pub fn train(&self, vectors: &[FeatureVector]) -> Result<ModelMetadata> {
        let entities: HashSet<&str> = vectors.iter().map(|v| v.entity_id.as_str()).collect();
        let min = &self.config.training;
        if vectors.len() < min.min_vectors || entities.len() < min.min_entities {
            return Err(CoreError::InsufficientTrainingData {
                vectors: vectors.len(),
                entities: entities.len(),
                min_vectors: min.min_vectors,
                min_entities: min.min_entities,
            });
        }

        for vector in vectors {
            if vector.values.len() != NUM_FEATURES || vector.schema_version != SCHEMA_VERSION {
                return Err(CoreError::FeatureSchemaMismatch {
                    expected: NUM_FEATURES,
                    got: vector.values.len(),
                    expected_schema: SCHEMA_VERSION,
                    got_schema: vector.schema_version,
                });
            }
        }

        info!(
            "Training ensemble on {} vectors from {} entities",
            vectors.len(),
            entities.len()
        );

        let scaler = Scaler::fit(vectors);
        let standardized: Vec<Vec<f64>> = vectors
            .iter()
            .map(|v| scaler.standardize(&v.values))
            .collect();

        let mut forest = IsolationForest::new(self.config.forest.clone());
        forest.fit(&standardized);

        let mut kmeans = KMeans::new(self.config.kmeans.clone());
        kmeans.fit(&standardized);

        let calibration = fit_calibration(&self.config, &forest, &kmeans, &standardized);

        let previous = self.active().map(|a| a.version).unwrap_or(0);
        let version = previous.max(self.storage.latest_version()?) + 1;

        let artifact = ModelArtifact {
            version,
            schema_version: SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            forest,
            kmeans,
            calibration,
            sample_count: vectors.len() as u64,
            trained_at: Utc::now(),
        };

        // Persist before publishing; an error here leaves the old version active
        self.storage.save_artifact(&artifact)?;
        let metadata = artifact.metadata();
        self.storage.activate(&metadata)?;

        *self.active.write() = Some(Arc::new(artifact));

        info!(
            "Activated model v{} ({} samples, baseline score {:.2})",
            metadata.version,
            metadata.sample_count,
            self.active().map(|a| a.calibration.baseline_score).unwrap_or(0.0)
        );

        Ok(metadata)
    }
}

/// Compute the calibration block from the fitted models and the training
/// population's raw combined scores
fn fit_calibration(
    config: &Config,
    forest: &IsolationForest,
    kmeans: &KMeans,
    standardized: &[Vec<f64>],
) -> Calibration {
    let mut calibration = Calibration {
        forest_weight: config.scoring.forest_weight,
        cluster_weight: config.scoring.cluster_weight,
        temperature: config.scoring.temperature,
        raw_mean: 0.0,
        raw_std: 0.0,
        baseline_score: 0.0,
    };

    let raw: Vec<f64> = standardized
        .iter()
        .map(|s| calibration.combine(forest.score(s), kmeans.score(s)))
        .collect();

    let n = raw.len() as f64;
    calibration.raw_mean = raw.iter().sum::<f64>() / n;
    calibration.raw_std = (raw
        .iter()
        .map(|r| (r - calibration.raw_mean).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    // The population-mean fingerprint standardizes to the origin
    let origin = vec![0.0; NUM_FEATURES];
    let baseline_raw = calibration.combine(forest.score(&origin), kmeans.score(&origin));
    calibration.baseline_score = calibration.calibrate(baseline_raw);

    calibration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_support::{normal_population, make_vector};
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> ModelRegistry {
        let config = Config::default().with_data_dir(temp.path());
        ModelRegistry::new(config).unwrap()
    }

    #[test]
    fn test_model_info_before_training() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        assert!(matches!(
            registry.model_info(),
            Err(CoreError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_insufficient_population() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        // One vector is not enough
        let single = vec![make_vector("emp-0", vec![1.0; NUM_FEATURES])];
        assert!(matches!(
            registry.train(&single),
            Err(CoreError::InsufficientTrainingData { .. })
        ));

        // Ten vectors from a single entity are not enough either
        let one_entity: Vec<_> = (0..10)
            .map(|i| make_vector("emp-0", vec![i as f64; NUM_FEATURES]))
            .collect();
        assert!(matches!(
            registry.train(&one_entity),
            Err(CoreError::InsufficientTrainingData { .. })
        ));

        // Failed training never activates anything
        assert!(registry.active().is_none());
    }

    #[test]
    fn test_train_activates_artifact() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let metadata = registry.train(&normal_population(12)).unwrap();
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.sample_count, 12);
        assert_eq!(metadata.schema_version, SCHEMA_VERSION);

        let info = registry.model_info().unwrap();
        assert_eq!(info.version, 1);
    }

    #[test]
    fn test_version_never_decreases() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let population = normal_population(12);

        let first = registry.train(&population).unwrap();
        let second = registry.train(&population).unwrap();
        assert!(second.version > first.version);

        // The superseded artifact remains loadable for old anomalies
        let old = registry.load_version(first.version).unwrap().unwrap();
        assert_eq!(old.version, first.version);
    }

    #[test]
    fn test_active_restored_across_restart() {
        let temp = TempDir::new().unwrap();
        {
            let registry = registry(&temp);
            registry.train(&normal_population(12)).unwrap();
        }

        let reopened = registry(&temp);
        assert_eq!(reopened.model_info().unwrap().version, 1);
    }

    #[test]
    fn test_schema_mismatch_rejected_in_training() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let mut population = normal_population(12);
        population[0].values.truncate(5);
        assert!(matches!(
            registry.train(&population),
            Err(CoreError::FeatureSchemaMismatch { .. })
        ));
    }
}
