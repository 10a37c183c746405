//! Population baseline statistics
//!
//! Tracks per-feature statistics over the training population and provides
//! the standardization used by both ensemble models.

use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, NUM_FEATURES};

const STD_EPSILON: f64 = 1e-9;

/// Statistics for a single feature
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureStats {
    pub count: u64,
    pub mean: f64,
    pub m2: f64, // For Welford's online variance
    pub min: f64,
    pub max: f64,
}

impl FeatureStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Update stats with a new value using Welford's algorithm
    #[inline]
    pub fn update(&mut self, value: f64) {
        self.count += 1;

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Population standard deviation
    #[inline]
    pub fn std(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// Z-score for a value; zero-variance features yield 0 for on-mean values
    #[inline]
    pub fn zscore(&self, value: f64) -> f64 {
        (value - self.mean) / self.std().max(STD_EPSILON)
    }
}

/// Per-feature standardization fitted over the training population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub stats: Vec<FeatureStats>,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler {
    pub fn new() -> Self {
        Self {
            stats: vec![FeatureStats::new(); NUM_FEATURES],
        }
    }

    /// Fit over a population of feature vectors
    pub fn fit(vectors: &[FeatureVector]) -> Self {
        let mut scaler = Self::new();
        for vector in vectors {
            for (i, &value) in vector.values.iter().enumerate() {
                if i < scaler.stats.len() {
                    scaler.stats[i].update(value);
                }
            }
        }
        scaler
    }

    /// Population means in feature order
    pub fn means(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.mean).collect()
    }

    /// Population standard deviations in feature order
    pub fn stds(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.std()).collect()
    }

    /// Standardize raw feature values (z-score per dimension)
    pub fn standardize(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| match self.stats.get(i) {
                Some(stats) => stats.zscore(v),
                None => 0.0,
            })
            .collect()
    }

    pub fn sample_count(&self) -> u64 {
        self.stats.first().map(|s| s.count).unwrap_or(0)
    }
}
