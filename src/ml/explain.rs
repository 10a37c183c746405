//! Shapley-style score attribution
//!
//! Decomposes an anomaly score into additive per-feature contributions via
//! permutation sampling: features are revealed in random order on top of the
//! population-mean fingerprint, and each feature is credited with the score
//! delta it causes. Contributions telescope, so over any number of sampled
//! permutations they sum to exactly (score - baseline score).

use std::time::{Duration, Instant};

use rand::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::features::{display_name, idx, FeatureVector, FEATURE_NAMES};
use super::registry::ModelArtifact;
use super::scoring::{AnomalyScore, EnsembleScorer};
use crate::config::ExplainConfig;
use crate::error::Result;

/// One feature's share of the score deviation
#[derive(Debug, Clone, Serialize)]
pub struct FeatureContribution {
    /// Position in the feature schema
    pub index: usize,
    pub name: String,
    pub display: String,
    /// The fingerprint's actual value for this feature
    pub value: f64,
    /// Signed contribution on the 0-100 score scale
    pub contribution: f64,
    /// 1-based rank by absolute contribution
    pub rank: usize,
    pub description: String,
}

/// Full attribution for one scored fingerprint
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// All contributions, ranked by absolute value descending
    pub contributions: Vec<FeatureContribution>,
    /// Calibrated score of the population-mean fingerprint
    pub baseline_score: f64,
    /// Permutations actually sampled
    pub samples_used: usize,
    /// True when the time budget expired before the full sample count
    pub approximate: bool,
}

impl Explanation {
    /// Bounded head of the ranking
    pub fn top(&self, k: usize) -> &[FeatureContribution] {
        &self.contributions[..k.min(self.contributions.len())]
    }

    /// Sum of all contributions; approximates score - baseline_score
    pub fn total_contribution(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }
}

/// Permutation-sampling Shapley explainer
#[derive(Debug, Clone)]
pub struct ShapExplainer {
    config: ExplainConfig,
    scorer: EnsembleScorer,
}

impl ShapExplainer {
    pub fn new(config: ExplainConfig) -> Self {
        Self {
            config,
            scorer: EnsembleScorer::new(),
        }
    }

    /// Attribute a score to the fingerprint's features.
    ///
    /// If the sampling deadline expires mid-run the estimate from the
    /// permutations completed so far is returned, flagged approximate; at
    /// least one permutation always completes.
    pub fn explain(
        &self,
        artifact: &ModelArtifact,
        vector: &FeatureVector,
        score: &AnomalyScore,
    ) -> Result<Explanation> {
        artifact.check_schema(vector)?;

        let n = vector.values.len();
        let base_values = artifact.scaler.means();
        let empty_score = self.scorer.score_values(artifact, &base_values);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let deadline = Instant::now() + Duration::from_millis(self.config.time_budget_ms);
        let permutations = self.config.permutations.max(1);

        let mut totals = vec![0.0; n];
        let mut completed = 0;
        let mut approximate = false;
        let mut order: Vec<usize> = (0..n).collect();

        for round in 0..permutations {
            if round > 0 && Instant::now() >= deadline {
                approximate = true;
                debug!(
                    "Attribution budget expired after {}/{} permutations",
                    completed, permutations
                );
                break;
            }

            order.shuffle(&mut rng);
            let mut hybrid = base_values.clone();
            let mut previous = empty_score;

            for &feature in &order {
                hybrid[feature] = vector.values[feature];
                let current = self.scorer.score_values(artifact, &hybrid);
                totals[feature] += current - previous;
                previous = current;
            }

            completed += 1;
        }

        let mut contributions: Vec<FeatureContribution> = totals
            .iter()
            .enumerate()
            .map(|(i, total)| {
                let contribution = total / completed as f64;
                let value = vector.values[i];
                FeatureContribution {
                    index: i,
                    name: FEATURE_NAMES[i].to_string(),
                    display: display_name(i).to_string(),
                    value,
                    contribution,
                    rank: 0,
                    description: describe_contribution(i, value, contribution),
                }
            })
            .collect();

        contributions.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (rank, contribution) in contributions.iter_mut().enumerate() {
            contribution.rank = rank + 1;
        }

        debug!(
            "Attributed score {:.2} across {} features (baseline {:.2}, {} permutations)",
            score.value, n, empty_score, completed
        );

        Ok(Explanation {
            contributions,
            baseline_score: empty_score,
            samples_used: completed,
            approximate,
        })
    }
}

/// Human-readable one-liner for a feature's contribution
fn describe_contribution(index: usize, value: f64, contribution: f64) -> String {
    let impact = if contribution >= 0.0 {
        "increases"
    } else {
        "decreases"
    };

    match index {
        idx::AVG_LOGIN_HOUR => format!("Logins around {:.1}:00 {} risk", value, impact),
        idx::LOGIN_HOUR_STD => {
            format!("Login time variability of {:.2} hours {} risk", value, impact)
        }
        idx::UNIQUE_LOCATIONS_COUNT => {
            format!("{} unique locations {} risk", value as i64, impact)
        }
        idx::LOCATION_DEVIATION => {
            format!("{:.0}% location deviation {} risk", value * 100.0, impact)
        }
        idx::UNIQUE_PORTS_COUNT => {
            format!("{} unique ports accessed {} risk", value as i64, impact)
        }
        idx::UNUSUAL_PORT_RATE => {
            format!("{:.0}% unusual port usage {} risk", value * 100.0, impact)
        }
        idx::FILE_ACCESS_RATE => format!("{:.1} files/day {} risk", value, impact),
        idx::SENSITIVE_FILE_RATE => {
            format!("{:.2} sensitive files/day {} risk", value, impact)
        }
        idx::PRIVILEGE_ESCALATION_RATE => {
            format!("{:.2} privilege escalations/day {} risk", value, impact)
        }
        idx::FIREWALL_CHANGE_COUNT => {
            format!("{} firewall changes {} risk", value as i64, impact)
        }
        idx::NETWORK_EVENT_VOLUME => {
            format!("{:.1} network events/day {} risk", value, impact)
        }
        idx::FAILED_LOGIN_COUNT => format!("{} failed logins {} risk", value as i64, impact),
        idx::WEEKDAY_ACTIVITY_RATIO => {
            format!("{:.0}% weekday activity {} risk", value * 100.0, impact)
        }
        idx::NIGHT_ACTIVITY_RATIO => {
            format!("{:.0}% night activity {} risk", value * 100.0, impact)
        }
        _ => format!("{:.2} {} risk", value, impact),
    }
}
