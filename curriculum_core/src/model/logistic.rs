//! Logistic-regression curriculum model.
//!
//! Features are standardized with the statistics of the fit batch, then a
//! weight vector is trained by full-batch gradient descent. Initial weights
//! come from a seeded RNG so two fits on the same data agree exactly.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{common_feature_count, outcome_label, CurriculumModel, ModelConfig, ModelError, ModelParameters};
use crate::condition::Condition;

const KIND: &str = "logistic";

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    weights: Array1<f64>,
    bias: f64,
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Fitted {
    fn probability(&self, features: &[f64]) -> f64 {
        let z = features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .zip(self.weights.iter())
            .map(|((&x, (&m, &s)), &w)| w * (x - m) / s)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    config: ModelConfig,
    fitted: Option<Fitted>,
}

impl LogisticModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Predicted probability that `sample` is positive, `None` when unfitted.
    pub fn probability(&self, sample: &Condition) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.probability(sample.features()))
    }

    fn design_matrix(samples: &[Condition], features: usize) -> Array2<f64> {
        let mut x = Array2::<f64>::zeros((samples.len(), features));
        for (mut row, sample) in x.axis_iter_mut(Axis(0)).zip(samples) {
            for (cell, &value) in row.iter_mut().zip(sample.features()) {
                *cell = value;
            }
        }
        x
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl CurriculumModel for LogisticModel {
    fn kind(&self) -> &str {
        KIND
    }

    fn fit(&mut self, samples: &[Condition]) -> Result<(), ModelError> {
        let features = common_feature_count(samples, "logistic fit")?;
        let n = samples.len() as f64;

        let raw = Self::design_matrix(samples, features);
        let mean = raw
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features));
        let scale = raw
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let x = (&raw - &mean) / &scale;

        let y: Array1<f64> = samples
            .iter()
            .map(|s| if self.ground_truth(s) { 1.0 } else { 0.0 })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut weights: Array1<f64> = (0..features).map(|_| rng.gen_range(-0.01..0.01)).collect();
        let mut bias = 0.0;

        for _ in 0..self.config.epochs {
            let z = x.dot(&weights) + bias;
            let residual = z.mapv(sigmoid) - &y;
            let grad_w = x.t().dot(&residual) / n + &weights * self.config.l2;
            let grad_b = residual.sum() / n;
            weights = weights - grad_w * self.config.learning_rate;
            bias -= grad_b * self.config.learning_rate;
        }

        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::Numerical(
                "logistic weights diverged during gradient descent".into(),
            ));
        }

        self.fitted = Some(Fitted {
            weights,
            bias,
            mean,
            scale,
        });
        Ok(())
    }

    fn score(&self, samples: &[Condition]) -> Result<Vec<bool>, ModelError> {
        let Some(fitted) = self.fitted.as_ref() else {
            return Ok(vec![false; samples.len()]);
        };
        let expected = fitted.weights.len();
        if let Some(bad) = samples.iter().find(|s| s.feature_count() != expected) {
            return Err(ModelError::dimension_mismatch(
                expected,
                bad.feature_count(),
                "logistic score",
            ));
        }
        Ok(samples
            .par_iter()
            .map(|s| fitted.probability(s.features()) >= 0.5)
            .collect())
    }

    fn ground_truth(&self, sample: &Condition) -> bool {
        outcome_label(sample, self.config.outcome_threshold)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn parameters(&self) -> ModelParameters {
        // Layout: [bias, weights.., mean.., scale..]
        match &self.fitted {
            None => ModelParameters {
                kind: KIND.into(),
                feature_count: 0,
                values: Vec::new(),
            },
            Some(f) => {
                let mut values = Vec::with_capacity(1 + 3 * f.weights.len());
                values.push(f.bias);
                values.extend(f.weights.iter());
                values.extend(f.mean.iter());
                values.extend(f.scale.iter());
                ModelParameters {
                    kind: KIND.into(),
                    feature_count: f.weights.len(),
                    values,
                }
            }
        }
    }

    fn restore(&mut self, parameters: &ModelParameters) -> Result<(), ModelError> {
        if parameters.kind != KIND {
            return Err(ModelError::Parameters(format!(
                "expected '{KIND}' parameters, found '{}'",
                parameters.kind
            )));
        }
        if parameters.values.is_empty() {
            self.fitted = None;
            return Ok(());
        }
        let d = parameters.feature_count;
        if parameters.values.len() != 1 + 3 * d {
            return Err(ModelError::Parameters(format!(
                "expected {} values for {d} features, found {}",
                1 + 3 * d,
                parameters.values.len()
            )));
        }
        let v = &parameters.values;
        self.fitted = Some(Fitted {
            bias: v[0],
            weights: Array1::from(v[1..1 + d].to_vec()),
            mean: Array1::from(v[1 + d..1 + 2 * d].to_vec()),
            scale: Array1::from(v[1 + 2 * d..].to_vec()),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Outcome is high whenever the first feature is large.
    fn separable(n: usize) -> Vec<Condition> {
        (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                let outcome = if x >= 0.5 { 1.0 } else { 0.0 };
                Condition::from_parts(&[x, 0.3], outcome)
            })
            .collect()
    }

    #[test]
    fn unfitted_model_predicts_negative() {
        let model = LogisticModel::new(ModelConfig::default());
        let preds = model.score(&separable(4)).unwrap();
        assert_eq!(preds, vec![false; 4]);
        assert!(model.probability(&separable(1)[0]).is_none());
    }

    #[test]
    fn learns_separable_data() {
        let mut model = LogisticModel::new(ModelConfig::default());
        let data = separable(40);
        model.fit(&data).unwrap();
        let preds = model.score(&data).unwrap();
        let correct = preds
            .iter()
            .zip(&data)
            .filter(|(p, s)| **p == model.ground_truth(s))
            .count();
        assert!(correct >= 36, "only {correct}/40 correct");
    }

    #[test]
    fn fit_is_deterministic() {
        let data = separable(20);
        let mut a = LogisticModel::new(ModelConfig::default());
        let mut b = LogisticModel::new(ModelConfig::default());
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn parameters_restore_predictions() {
        let data = separable(30);
        let mut model = LogisticModel::new(ModelConfig::default());
        model.fit(&data).unwrap();

        let mut fresh = LogisticModel::new(ModelConfig::default());
        fresh.restore(&model.parameters()).unwrap();
        assert_eq!(fresh.parameters(), model.parameters());
        assert_eq!(fresh.score(&data).unwrap(), model.score(&data).unwrap());
    }

    #[test]
    fn restore_rejects_foreign_parameters() {
        let mut model = LogisticModel::new(ModelConfig::default());
        let foreign = ModelParameters {
            kind: "centroid".into(),
            feature_count: 0,
            values: Vec::new(),
        };
        assert!(matches!(
            model.restore(&foreign),
            Err(ModelError::Parameters(_))
        ));
    }

    #[test]
    fn score_rejects_wrong_width() {
        let mut model = LogisticModel::new(ModelConfig::default());
        model.fit(&separable(10)).unwrap();
        let err = model
            .score(&[Condition::from_parts(&[1.0], 1.0)])
            .unwrap_err();
        assert_eq!(err, ModelError::dimension_mismatch(2, 1, "logistic score"));
    }

    #[test]
    fn fit_rejects_empty_batch() {
        let mut model = LogisticModel::new(ModelConfig::default());
        assert_eq!(model.fit(&[]).unwrap_err(), ModelError::EmptyBatch);
        assert!(!model.is_fitted());
    }
}
