//! Nearest-centroid curriculum model.
//!
//! Keeps the mean feature vector of positive and negative samples and labels a
//! condition by whichever centroid is closer. When the fit batch contains a
//! single class, every prediction is that class.

use super::{common_feature_count, outcome_label, CurriculumModel, ModelError, ModelParameters};
use crate::condition::Condition;

const KIND: &str = "centroid";

#[derive(Debug, Clone)]
pub struct CentroidModel {
    outcome_threshold: f64,
    feature_count: usize,
    positive: Option<Vec<f64>>,
    negative: Option<Vec<f64>>,
}

impl CentroidModel {
    pub fn new(outcome_threshold: f64) -> Self {
        Self {
            outcome_threshold,
            feature_count: 0,
            positive: None,
            negative: None,
        }
    }

    fn predict(&self, features: &[f64]) -> bool {
        match (&self.positive, &self.negative) {
            (Some(pos), Some(neg)) => squared_distance(features, pos) < squared_distance(features, neg),
            (Some(_), None) => true,
            _ => false,
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn centroid<'a>(rows: impl Iterator<Item = &'a [f64]>, width: usize) -> Option<Vec<f64>> {
    let mut sum = vec![0.0; width];
    let mut count = 0usize;
    for row in rows {
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum.into_iter().map(|s| s / count as f64).collect())
}

impl CurriculumModel for CentroidModel {
    fn kind(&self) -> &str {
        KIND
    }

    fn fit(&mut self, samples: &[Condition]) -> Result<(), ModelError> {
        let width = common_feature_count(samples, "centroid fit")?;
        let threshold = self.outcome_threshold;
        self.positive = centroid(
            samples
                .iter()
                .filter(|s| outcome_label(s, threshold))
                .map(Condition::features),
            width,
        );
        self.negative = centroid(
            samples
                .iter()
                .filter(|s| !outcome_label(s, threshold))
                .map(Condition::features),
            width,
        );
        self.feature_count = width;
        Ok(())
    }

    fn score(&self, samples: &[Condition]) -> Result<Vec<bool>, ModelError> {
        if !self.is_fitted() {
            return Ok(vec![false; samples.len()]);
        }
        samples
            .iter()
            .map(|s| {
                if s.feature_count() != self.feature_count {
                    Err(ModelError::dimension_mismatch(
                        self.feature_count,
                        s.feature_count(),
                        "centroid score",
                    ))
                } else {
                    Ok(self.predict(s.features()))
                }
            })
            .collect()
    }

    fn ground_truth(&self, sample: &Condition) -> bool {
        outcome_label(sample, self.outcome_threshold)
    }

    fn is_fitted(&self) -> bool {
        self.positive.is_some() || self.negative.is_some()
    }

    fn parameters(&self) -> ModelParameters {
        // Layout: [has_positive, has_negative, positive.., negative..]
        if !self.is_fitted() {
            return ModelParameters {
                kind: KIND.into(),
                feature_count: 0,
                values: Vec::new(),
            };
        }
        let d = self.feature_count;
        let flag = |c: &Option<Vec<f64>>| if c.is_some() { 1.0 } else { 0.0 };
        let mut values = vec![flag(&self.positive), flag(&self.negative)];
        values.extend(self.positive.clone().unwrap_or_else(|| vec![0.0; d]));
        values.extend(self.negative.clone().unwrap_or_else(|| vec![0.0; d]));
        ModelParameters {
            kind: KIND.into(),
            feature_count: d,
            values,
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
            *self = Self::new(self.outcome_threshold);
            return Ok(());
        }
        let d = parameters.feature_count;
        let v = &parameters.values;
        if v.len() != 2 + 2 * d {
            return Err(ModelError::Parameters(format!(
                "expected {} values for {d} features, found {}",
                2 + 2 * d,
                v.len()
            )));
        }
        self.feature_count = d;
        self.positive = (v[0] > 0.5).then(|| v[2..2 + d].to_vec());
        self.negative = (v[1] > 0.5).then(|| v[2 + d..].to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<Condition> {
        vec![
            Condition::from_parts(&[0.0, 0.0], 0.0),
            Condition::from_parts(&[0.2, 0.1], 0.0),
            Condition::from_parts(&[1.0, 1.0], 1.0),
            Condition::from_parts(&[0.9, 1.1], 1.0),
        ]
    }

    #[test]
    fn predicts_nearest_class() {
        let mut model = CentroidModel::new(0.5);
        model.fit(&batch()).unwrap();
        let preds = model
            .score(&[
                Condition::from_parts(&[0.1, 0.0], 0.0),
                Condition::from_parts(&[0.95, 0.9], 1.0),
            ])
            .unwrap();
        assert_eq!(preds, vec![false, true]);
    }

    #[test]
    fn single_class_fit_predicts_that_class() {
        let mut model = CentroidModel::new(0.5);
        model
            .fit(&[Condition::from_parts(&[3.0], 1.0)])
            .unwrap();
        assert_eq!(
            model.score(&[Condition::from_parts(&[-100.0], 0.0)]).unwrap(),
            vec![true]
        );
    }

    #[test]
    fn parameters_roundtrip() {
        let mut model = CentroidModel::new(0.5);
        model.fit(&batch()).unwrap();
        let mut fresh = CentroidModel::new(0.5);
        fresh.restore(&model.parameters()).unwrap();
        assert_eq!(fresh.parameters(), model.parameters());
        assert_eq!(fresh.score(&batch()).unwrap(), model.score(&batch()).unwrap());
    }

    #[test]
    fn unfitted_parameters_are_empty() {
        let model = CentroidModel::new(0.5);
        let params = model.parameters();
        assert!(params.values.is_empty());
        let mut other = CentroidModel::new(0.5);
        other.restore(&params).unwrap();
        assert!(!other.is_fitted());
    }
}
