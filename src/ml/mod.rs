//! Behavioral risk scoring pipeline
//!
//! Wires the full serving path: event history -> fingerprint -> ensemble
//! score -> attribution -> technique mapping -> mitigation recommendations.
//!
//! # Example
//! ```ignore
//! use insidermon::{Config, RiskEngine, WindowBounds};
//!
//! let engine = RiskEngine::new(Config::default())?;
//! engine.train_population(&histories, &window)?;
//!
//! let report = engine.analyze("emp-42", &events, &window, Some("hq"))?;
//! println!("{}: {} ({})", report.entity_id, report.score.value, report.risk_level);
//! ```

pub mod baseline;
pub mod explain;
pub mod features;
pub mod models;
pub mod registry;
pub mod scoring;
pub mod storage;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::events::{Event, WindowBounds};
use crate::mitigation::{self, MitigationStrategy};
use crate::mitre::{self, AnomalyType, MitreMapping};

pub use explain::{Explanation, FeatureContribution, ShapExplainer};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_NAMES, NUM_FEATURES, SCHEMA_VERSION};
pub use registry::{ModelArtifact, ModelMetadata, ModelRegistry};
pub use scoring::{AnomalyScore, EnsembleScorer, RiskLevel};

/// One entity's materialized event history for a training pass
#[derive(Debug, Clone)]
pub struct EntityHistory {
    pub entity_id: String,
    pub baseline_location: Option<String>,
    pub events: Vec<Event>,
}

/// Result bundle handed to the surrounding persistence/API layer
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub entity_id: String,
    pub score: AnomalyScore,
    pub risk_level: RiskLevel,
    pub anomaly_type: AnomalyType,
    pub description: String,
    /// Dominant contributions, bounded to the configured top-k
    pub top_features: Vec<FeatureContribution>,
    pub techniques: Vec<MitreMapping>,
    pub mitigations: Vec<MitigationStrategy>,
    /// True when the attribution was cut short by its time budget
    pub approximate_explanation: bool,
}

/// Main scoring engine
///
/// Holds no mutable scoring state: concurrent `analyze` calls share an
/// immutable snapshot of the active model, and training publishes new
/// artifacts through the registry's atomic swap.
pub struct RiskEngine {
    config: Config,
    extractor: FeatureExtractor,
    registry: ModelRegistry,
    scorer: EnsembleScorer,
    explainer: ShapExplainer,
}

impl RiskEngine {
    pub fn new(config: Config) -> Result<Self> {
        let registry = ModelRegistry::new(config.clone())?;
        let explainer = ShapExplainer::new(config.explain.clone());

        Ok(Self {
            config,
            extractor: FeatureExtractor::new(),
            registry,
            scorer: EnsembleScorer::new(),
            explainer,
        })
    }

    /// Compute the behavioral fingerprint for one entity
    pub fn fingerprint(
        &self,
        entity_id: &str,
        events: &[Event],
        window: &WindowBounds,
        baseline_location: Option<&str>,
    ) -> FeatureVector {
        self.extractor
            .extract(entity_id, events, window, baseline_location)
    }

    /// Fit the ensemble on pre-computed fingerprints and activate the result
    pub fn train(&self, vectors: &[FeatureVector]) -> Result<ModelMetadata> {
        self.registry.train(vectors)
    }

    /// Fingerprint each entity history, then train on the population
    pub fn train_population(
        &self,
        histories: &[EntityHistory],
        window: &WindowBounds,
    ) -> Result<ModelMetadata> {
        let vectors: Vec<FeatureVector> = histories
            .iter()
            .map(|h| {
                self.extractor.extract(
                    &h.entity_id,
                    &h.events,
                    window,
                    h.baseline_location.as_deref(),
                )
            })
            .collect();

        debug!("Fingerprinted {} entities for training", vectors.len());
        self.registry.train(&vectors)
    }

    /// Metadata of the active model
    pub fn model_info(&self) -> Result<ModelMetadata> {
        self.registry.model_info()
    }

    /// Score a fingerprint against the active model
    pub fn score(&self, vector: &FeatureVector) -> Result<AnomalyScore> {
        let artifact = self.registry.active().ok_or(CoreError::ModelNotTrained)?;
        self.scorer.score(&artifact, vector)
    }

    /// Attribute a score to the fingerprint's features
    pub fn explain(&self, vector: &FeatureVector, score: &AnomalyScore) -> Result<Explanation> {
        let artifact = self.registry.active().ok_or(CoreError::ModelNotTrained)?;
        self.explainer.explain(&artifact, vector, score)
    }

    /// Run the full serving path for one entity
    pub fn analyze(
        &self,
        entity_id: &str,
        events: &[Event],
        window: &WindowBounds,
        baseline_location: Option<&str>,
    ) -> Result<AnomalyReport> {
        // One snapshot for the whole request; a concurrent training pass
        // cannot change the model mid-analysis
        let artifact = self.registry.active().ok_or(CoreError::ModelNotTrained)?;

        let vector = self
            .extractor
            .extract(entity_id, events, window, baseline_location);
        let score = self.scorer.score(&artifact, &vector)?;
        let explanation = self.explainer.explain(&artifact, &vector, &score)?;

        let top_features = explanation.top(self.config.explain.top_k).to_vec();
        let techniques = mitre::map_techniques(&top_features);
        let anomaly_type = mitre::determine_anomaly_type(&top_features);
        let risk_level = score.risk_level();
        let description = mitre::describe_anomaly(entity_id, anomaly_type, &top_features);
        let mitigations = mitigation::recommend(anomaly_type, risk_level, &techniques);

        info!(
            "Analyzed {}: score {:.1} ({}), {} techniques, {} mitigations",
            entity_id,
            score.value,
            risk_level,
            techniques.len(),
            mitigations.len()
        );

        Ok(AnomalyReport {
            entity_id: entity_id.to_string(),
            score,
            risk_level,
            anomaly_type,
            description,
            top_features,
            techniques,
            mitigations,
            approximate_explanation: explanation.approximate,
        })
    }

    /// Load a historical artifact by version
    pub fn load_model_version(&self, version: u32) -> Result<Option<ModelArtifact>> {
        self.registry.load_version(version)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for module tests

    use chrono::Utc;
    use tempfile::TempDir;

    use super::features::{FeatureVector, NUM_FEATURES, SCHEMA_VERSION};
    use super::registry::{ModelArtifact, ModelRegistry};
    use crate::config::Config;

    pub fn make_vector(entity_id: &str, values: Vec<f64>) -> FeatureVector {
        FeatureVector {
            entity_id: entity_id.to_string(),
            values,
            schema_version: SCHEMA_VERSION,
            computed_at: Utc::now(),
        }
    }

    /// A plausible office population: day-shift logins from one location on
    /// common ports, with per-entity variation
    pub fn normal_population(n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                let mut values = vec![0.0; NUM_FEATURES];
                values[0] = 9.0 + (i % 3) as f64 * 0.5; // avg_login_hour
                values[1] = 0.5 + (i % 4) as f64 * 0.25; // login_hour_std
                values[2] = 1.0; // unique_locations_count
                values[3] = 0.0; // location_deviation
                values[4] = 2.0 + (i % 3) as f64; // unique_ports_count
                values[5] = 0.0; // unusual_port_rate
                values[6] = 4.0 + (i % 5) as f64 * 0.5; // file_access_rate
                values[7] = 0.1 * (i % 2) as f64; // sensitive_file_rate
                values[8] = 0.0; // privilege_escalation_rate
                values[9] = 0.0; // firewall_change_count
                values[10] = 8.0 + (i % 4) as f64; // network_event_volume
                values[11] = (i % 2) as f64; // failed_login_count
                values[12] = 0.85 + (i % 3) as f64 * 0.05; // weekday_activity_ratio
                values[13] = (i % 5) as f64 * 0.08; // night_activity_ratio
                make_vector(&format!("emp-{}", i), values)
            })
            .collect()
    }

    /// Train an artifact on the normal population and return it by value
    pub fn trained_artifact() -> ModelArtifact {
        let temp = TempDir::new().unwrap();
        let config = Config::default().with_data_dir(temp.path());
        let registry = ModelRegistry::new(config).unwrap();
        registry.train(&normal_population(12)).unwrap();
        let artifact = registry.active().unwrap();
        (*artifact).clone()
    }

    /// Trained artifact stamped with an arbitrary version
    pub fn make_artifact(version: u32) -> ModelArtifact {
        let mut artifact = trained_artifact();
        artifact.version = version;
        artifact
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::normal_population;
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use crate::events::EventType;

    fn engine(temp: &TempDir) -> RiskEngine {
        let config = Config::default().with_data_dir(temp.path());
        RiskEngine::new(config).unwrap()
    }

    #[test]
    fn test_score_before_training_fails() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);

        let window = WindowBounds::last_days(Utc::now(), 30);
        let vector = engine.fingerprint("emp-1", &[], &window, None);

        assert!(matches!(
            engine.score(&vector),
            Err(CoreError::ModelNotTrained)
        ));
        assert!(matches!(
            engine.analyze("emp-1", &[], &window, None),
            Err(CoreError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_analyze_produces_full_report() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        engine.train(&normal_population(12)).unwrap();

        let window = {
            let end = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
            WindowBounds::last_days(end, 30)
        };
        let ts = Utc.with_ymd_and_hms(2025, 6, 3, 9, 0, 0).unwrap();
        let events = vec![Event::new("emp-1", EventType::Login, ts).with_location("hq")];

        let report = engine.analyze("emp-1", &events, &window, Some("hq")).unwrap();

        assert_eq!(report.entity_id, "emp-1");
        assert!((0.0..=100.0).contains(&report.score.value));
        assert_eq!(report.score.model_version, 1);
        assert!(!report.top_features.is_empty());
        assert!(!report.mitigations.is_empty());
        assert!(!report.description.is_empty());
    }

    #[test]
    fn test_training_does_not_disturb_served_snapshot() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let population = normal_population(12);

        engine.train(&population).unwrap();
        let vector = population[0].clone();
        let before = engine.score(&vector).unwrap();

        engine.train(&population).unwrap();
        let after = engine.score(&vector).unwrap();

        // New version serves subsequent requests; the recorded score still
        // names the version it was computed under
        assert_eq!(before.model_version, 1);
        assert_eq!(after.model_version, 2);
        assert!(engine.load_model_version(1).unwrap().is_some());
    }
}
