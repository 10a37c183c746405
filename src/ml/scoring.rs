//! Ensemble anomaly scoring
//!
//! Blends the isolation-forest and cluster-distance terms with fixed weights
//! and calibrates the result into the 0-100 risk scale using statistics of
//! the training population.

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use super::models::AnomalyModel;
use super::registry::ModelArtifact;
use crate::error::Result;

/// Floor applied to the stored raw-score std so degenerate populations
/// (e.g. all-identical fingerprints) calibrate cleanly instead of dividing
/// by zero
const RAW_STD_FLOOR: f64 = 1e-6;

/// Calibration block fitted at training time and frozen into the artifact.
/// Serving is a pure function of these parameters, so retuning the config
/// never changes how an already-published model scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Weight of the isolation-forest term
    pub forest_weight: f64,
    /// Weight of the cluster-distance term
    pub cluster_weight: f64,
    /// Steepness of the logistic curve
    pub temperature: f64,
    /// Mean raw combined score over the training population
    pub raw_mean: f64,
    /// Std-dev of raw combined scores over the training population
    pub raw_std: f64,
    /// Calibrated score of the population-mean fingerprint
    pub baseline_score: f64,
}

impl Calibration {
    /// Blend the two model terms into the raw combined score
    #[inline]
    pub fn combine(&self, forest_term: f64, cluster_term: f64) -> f64 {
        self.forest_weight * forest_term + self.cluster_weight * cluster_term
    }

    /// Map a raw combined score onto the 0-100 scale.
    ///
    /// Logistic curve centered on the population mean: raw scores at or below
    /// what the training population typically produces map to 0, roughly
    /// three population std-devs above map to 90+.
    pub fn calibrate(&self, raw: f64) -> f64 {
        let z = (raw - self.raw_mean) / self.raw_std.max(RAW_STD_FLOOR);
        let unit = 2.0 * sigmoid(z / self.temperature) - 1.0;
        100.0 * unit.clamp(0.0, 1.0)
    }
}

/// Derived risk classification; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of scoring one fingerprint against the active model
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyScore {
    /// Calibrated risk score in [0, 100]
    pub value: f64,
    /// Isolation-forest component term in [0, 1]
    pub forest_term: f64,
    /// Cluster-distance component term in [0, 1]
    pub cluster_term: f64,
    /// Raw combined score before calibration
    pub raw: f64,
    /// Version of the model the score was produced against
    pub model_version: u32,
    /// Feature schema the model was trained on
    pub schema_version: u32,
}

impl AnomalyScore {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.value)
    }
}

/// Stateless scorer over an immutable model artifact
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsembleScorer;

impl EnsembleScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a fingerprint against an artifact.
    ///
    /// Pure function of (vector, artifact): identical inputs always produce
    /// identical scores, and no state is mutated.
    pub fn score(&self, artifact: &ModelArtifact, vector: &FeatureVector) -> Result<AnomalyScore> {
        artifact.check_schema(vector)?;

        let standardized = artifact.scaler.standardize(&vector.values);
        let forest_term = artifact.forest.score(&standardized);
        let cluster_term = artifact.kmeans.score(&standardized);
        let raw = artifact.calibration.combine(forest_term, cluster_term);

        Ok(AnomalyScore {
            value: artifact.calibration.calibrate(raw),
            forest_term,
            cluster_term,
            raw,
            model_version: artifact.version,
            schema_version: artifact.schema_version,
        })
    }

    /// Calibrated score for raw feature values, bypassing schema checks.
    /// Used by the explainer to evaluate hybrid vectors.
    pub fn score_values(&self, artifact: &ModelArtifact, values: &[f64]) -> f64 {
        let standardized = artifact.scaler.standardize(values);
        let forest_term = artifact.forest.score(&standardized);
        let cluster_term = artifact.kmeans.score(&standardized);
        artifact
            .calibration
            .calibrate(artifact.calibration.combine(forest_term, cluster_term))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration(raw_mean: f64, raw_std: f64) -> Calibration {
        Calibration {
            forest_weight: 0.6,
            cluster_weight: 0.4,
            temperature: 1.0,
            raw_mean,
            raw_std,
            baseline_score: 0.0,
        }
    }

    #[test]
    fn test_combine_weights() {
        let cal = calibration(0.0, 1.0);
        assert!((cal.combine(1.0, 0.0) - 0.6).abs() < 1e-9);
        assert!((cal.combine(0.0, 1.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_at_population_mean_is_zero() {
        let cal = calibration(0.35, 0.05);
        assert_eq!(cal.calibrate(0.35), 0.0);
        assert_eq!(cal.calibrate(0.2), 0.0);
    }

    #[test]
    fn test_calibrate_saturates_for_outliers() {
        let cal = calibration(0.35, 0.05);
        let three_sigma = cal.calibrate(0.35 + 3.0 * 0.05);
        let extreme = cal.calibrate(5.0);

        assert!(three_sigma > 80.0, "3 sigma -> {}", three_sigma);
        assert!(extreme > 99.0);
        assert!(extreme <= 100.0);
    }

    #[test]
    fn test_calibrate_monotonic() {
        let cal = calibration(0.3, 0.1);
        let mut prev = cal.calibrate(0.0);
        for i in 1..50 {
            let next = cal.calibrate(i as f64 * 0.02);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn test_zero_std_population_guard() {
        let cal = calibration(0.3, 0.0);
        // Members of a degenerate population sit exactly on the mean
        assert_eq!(cal.calibrate(0.3), 0.0);
        assert!(cal.calibrate(0.31).is_finite());
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(39.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.as_str(), "critical");
    }
}
