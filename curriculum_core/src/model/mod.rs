//! Pluggable curriculum models.
//!
//! A specialist only needs two capabilities from its model: learn from a batch
//! of conditions (`fit`) and predict, per condition, whether it is currently
//! worth training on (`score`). The model also owns the ground-truth rule used
//! to build confusion matrices, so the orchestration never assumes a specific
//! classification rule.

pub mod centroid;
pub mod logistic;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::Condition;

pub use centroid::CentroidModel;
pub use logistic::LogisticModel;

/// Errors raised by curriculum models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Fit was called without samples.
    #[error("Cannot fit on an empty batch")]
    EmptyBatch,

    /// A condition has a different number of features than expected.
    #[error("Dimension mismatch in {context}: expected {expected} features, got {got}")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    /// `score` returned a label count different from the batch size.
    #[error("Model returned {got} labels for a batch of {expected} samples")]
    LabelCount { expected: usize, got: usize },

    /// Persisted parameters do not belong to this model.
    #[error("Cannot restore parameters: {0}")]
    Parameters(String),

    /// Training diverged.
    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl ModelError {
    pub fn dimension_mismatch(expected: usize, got: usize, context: impl Into<String>) -> Self {
        ModelError::DimensionMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    pub fn label_count(expected: usize, got: usize) -> Self {
        ModelError::LabelCount { expected, got }
    }
}

/// Serializable model state, stored inside specialist checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Model family tag, checked on restore.
    pub kind: String,
    /// Feature count the parameters were fitted for (0 when unfitted).
    pub feature_count: usize,
    /// Flattened parameters; layout is model specific.
    pub values: Vec<f64>,
}

/// Capability interface every curriculum model implements.
pub trait CurriculumModel: std::fmt::Debug + Send {
    /// Model family tag used in checkpoints.
    fn kind(&self) -> &str;

    /// Refit the model on `samples`.
    fn fit(&mut self, samples: &[Condition]) -> Result<(), ModelError>;

    /// Predict, for each sample, whether it is worth training on.
    fn score(&self, samples: &[Condition]) -> Result<Vec<bool>, ModelError>;

    /// Label a sample from its outcome field.
    fn ground_truth(&self, sample: &Condition) -> bool;

    /// Whether `fit` has succeeded at least once.
    fn is_fitted(&self) -> bool;

    fn parameters(&self) -> ModelParameters;

    fn restore(&mut self, parameters: &ModelParameters) -> Result<(), ModelError>;
}

/// Built-in model families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Logistic,
    Centroid,
}

/// Settings for the built-in models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Outcomes at or above this value are labelled positive.
    pub outcome_threshold: f64,
    /// Gradient-descent epochs per fit (logistic only).
    pub epochs: usize,
    /// Gradient-descent step size (logistic only).
    pub learning_rate: f64,
    /// L2 penalty on weights (logistic only).
    pub l2: f64,
    /// Seed for weight initialisation (logistic only).
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Logistic,
            outcome_threshold: 0.5,
            epochs: 200,
            learning_rate: 0.5,
            l2: 1e-3,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Instantiate the configured model.
    pub fn build(&self) -> Box<dyn CurriculumModel> {
        match self.kind {
            ModelKind::Logistic => Box::new(LogisticModel::new(self.clone())),
            ModelKind::Centroid => Box::new(CentroidModel::new(self.outcome_threshold)),
        }
    }
}

/// Shared ground-truth rule of the built-in models.
pub(crate) fn outcome_label(sample: &Condition, threshold: f64) -> bool {
    sample.outcome().is_some_and(|o| o >= threshold)
}

/// Feature count shared by every sample, or an error naming the first outlier.
pub(crate) fn common_feature_count(
    samples: &[Condition],
    context: &str,
) -> Result<usize, ModelError> {
    let first = samples.first().ok_or(ModelError::EmptyBatch)?;
    let expected = first.feature_count();
    for sample in samples {
        if sample.feature_count() != expected {
            return Err(ModelError::dimension_mismatch(
                expected,
                sample.feature_count(),
                context,
            ));
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_logistic() {
        let model = ModelConfig::default().build();
        assert_eq!(model.kind(), "logistic");
        assert!(!model.is_fitted());
    }

    #[test]
    fn centroid_kind_builds_centroid() {
        let config = ModelConfig {
            kind: ModelKind::Centroid,
            ..ModelConfig::default()
        };
        assert_eq!(config.build().kind(), "centroid");
    }

    #[test]
    fn outcome_threshold_is_inclusive() {
        assert!(outcome_label(&Condition::new(vec![0.0, 0.5]), 0.5));
        assert!(!outcome_label(&Condition::new(vec![0.0, 0.49]), 0.5));
        assert!(!outcome_label(&Condition::new(Vec::new()), 0.5));
    }

    #[test]
    fn feature_count_rejects_ragged_batches() {
        let samples = vec![
            Condition::new(vec![1.0, 2.0, 1.0]),
            Condition::new(vec![1.0, 0.0]),
        ];
        let err = common_feature_count(&samples, "fit").unwrap_err();
        assert_eq!(err, ModelError::dimension_mismatch(2, 1, "fit"));
        assert_eq!(
            common_feature_count(&[], "fit").unwrap_err(),
            ModelError::EmptyBatch
        );
    }

    #[test]
    fn model_config_reads_partial_toml() {
        let config: ModelConfig = toml::from_str("kind = \"centroid\"\noutcome_threshold = 0.8").unwrap();
        assert_eq!(config.kind, ModelKind::Centroid);
        assert_eq!(config.outcome_threshold, 0.8);
        assert_eq!(config.epochs, ModelConfig::default().epochs);
    }
}
