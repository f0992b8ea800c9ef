//! Per-trial condition samples and per-generation evolution statistics.
//!
//! A [`Condition`] is the unit of data that flows from the evolutionary run
//! into the curriculum specialists. Its layout is fixed: every value except
//! the last is a feature describing the trial (environment parameters, seeds
//! mapped to numbers, ...), and the last value is the trial's outcome.

use serde::{Deserialize, Serialize};

/// One evaluated trial within a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition {
    values: Vec<f64>,
}

impl Condition {
    /// Build a condition from its raw values (features followed by the outcome).
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Build a condition from separate features and outcome.
    pub fn from_parts(features: &[f64], outcome: f64) -> Self {
        let mut values = Vec::with_capacity(features.len() + 1);
        values.extend_from_slice(features);
        values.push(outcome);
        Self { values }
    }

    /// All raw values, outcome last.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Feature columns (every value but the outcome).
    pub fn features(&self) -> &[f64] {
        match self.values.split_last() {
            Some((_, features)) => features,
            None => &[],
        }
    }

    /// Outcome field, `None` for an empty condition.
    pub fn outcome(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn feature_count(&self) -> usize {
        self.values.len().saturating_sub(1)
    }
}

impl From<Vec<f64>> for Condition {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Statistics the evolutionary search reports for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    /// Cumulative environment steps consumed so far.
    pub steps: u64,
    /// Fitness of the best individual so far.
    pub bestfit: f64,
    /// Fitness of the best post-evaluated individual so far.
    pub bestgfit: f64,
    /// Fitness of the best sample of this generation.
    pub best_sample_fit: f64,
    /// Average fitness of this generation's population.
    pub avgfit: f64,
    /// Average absolute value of the evolving parameter vector.
    pub avg_param_norm: f64,
}
