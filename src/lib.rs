//! insidermon - behavioral insider-threat risk scoring
//!
//! Assigns and explains a 0-100 behavioral risk score for individual actors
//! from their activity events. The pipeline: a fixed 14-dimension behavioral
//! fingerprint, an isolation-forest + k-means ensemble calibrated against the
//! training population, Shapley-style per-feature attribution, ATT&CK
//! technique mapping, and prioritized mitigation recommendations.
//!
//! The crate is the scoring core only: event transport/storage, the API
//! layer, and response enforcement belong to the surrounding system, which
//! hands in already-materialized event histories and consumes the
//! [`AnomalyReport`] bundle.

pub mod config;
pub mod error;
pub mod events;
pub mod mitigation;
pub mod mitre;
pub mod ml;

pub use config::Config;
pub use error::{CoreError, Result};
pub use events::{Event, EventType, WindowBounds};
pub use mitigation::{MitigationCategory, MitigationStrategy};
pub use mitre::{AnomalyType, MitreMapping};
pub use ml::{
    AnomalyReport, AnomalyScore, EntityHistory, Explanation, FeatureContribution,
    FeatureExtractor, FeatureVector, ModelMetadata, RiskEngine, RiskLevel, FEATURE_NAMES,
    NUM_FEATURES, SCHEMA_VERSION,
};
