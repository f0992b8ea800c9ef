use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DataError, GenerationDataSource};
use crate::condition::{Condition, EvolutionRecord};

#[derive(Debug, Clone, PartialEq)]
struct GenerationData {
    evolution: EvolutionRecord,
    conditions: Vec<Condition>,
    genotype: Option<Vec<f64>>,
}

/// Generation store held in memory, for tests and demos.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryDataSource {
    generations: BTreeMap<u64, GenerationData>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, generation: u64, evolution: EvolutionRecord, conditions: Vec<Condition>) {
        self.generations.insert(
            generation,
            GenerationData {
                evolution,
                conditions,
                genotype: None,
            },
        );
    }

    /// Attach the best genotype known at `generation`.
    pub fn set_genotype(&mut self, generation: u64, genotype: Vec<f64>) -> Result<(), DataError> {
        let data = self
            .generations
            .get_mut(&generation)
            .ok_or(DataError::MissingGeneration { generation })?;
        data.genotype = Some(genotype);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Deterministic synthetic run.
    ///
    /// Each condition has `features` uniform features in `[0, 1)`; its
    /// outcome is 1.0 when the first feature exceeds a difficulty level that
    /// rises with the generation, else 0.0. Fitness statistics improve
    /// steadily across generations.
    pub fn synthetic(seed: u64, generations: u64, trials: usize, features: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut source = Self::new();
        let features = features.max(1);

        for generation in 1..=generations {
            let progress = generation as f64 / generations.max(1) as f64;
            let difficulty = 0.2 + 0.6 * progress;

            let conditions = (0..trials)
                .map(|_| {
                    let values: Vec<f64> = (0..features).map(|_| rng.gen::<f64>()).collect();
                    let outcome = if values[0] > difficulty { 1.0 } else { 0.0 };
                    Condition::from_parts(&values, outcome)
                })
                .collect();

            let best_sample_fit = 100.0 * progress + rng.gen_range(-5.0..5.0);
            let evolution = EvolutionRecord {
                steps: generation * trials as u64 * 1000,
                bestfit: 100.0 * progress,
                bestgfit: 95.0 * progress,
                best_sample_fit,
                avgfit: 60.0 * progress,
                avg_param_norm: 0.1 + 0.01 * generation as f64,
            };
            source.generations.insert(
                generation,
                GenerationData {
                    evolution,
                    conditions,
                    genotype: Some(vec![progress; 4]),
                },
            );
        }
        source
    }

    fn get(&self, generation: u64) -> Result<&GenerationData, DataError> {
        self.generations
            .get(&generation)
            .ok_or(DataError::MissingGeneration { generation })
    }
}

impl GenerationDataSource for InMemoryDataSource {
    fn max_gen(&self) -> u64 {
        self.generations.keys().next_back().copied().unwrap_or(0)
    }

    fn read_evolution(&self, generation: u64) -> Result<EvolutionRecord, DataError> {
        Ok(self.get(generation)?.evolution)
    }

    fn read_conditions(&self, generation: u64) -> Result<Vec<Condition>, DataError> {
        Ok(self.get(generation)?.conditions.clone())
    }

    fn read_best_genotype(&self, generation: u64) -> Result<Option<Vec<f64>>, DataError> {
        Ok(self.get(generation)?.genotype.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_is_reproducible() {
        let a = InMemoryDataSource::synthetic(7, 5, 10, 3);
        let b = InMemoryDataSource::synthetic(7, 5, 10, 3);
        assert_eq!(a, b);
        assert_eq!(a.max_gen(), 5);
        let conditions = a.read_conditions(3).unwrap();
        assert_eq!(conditions.len(), 10);
        assert!(conditions.iter().all(|c| c.feature_count() == 3));
        assert!(a.read_best_genotype(5).unwrap().is_some());
    }

    #[test]
    fn missing_generation_is_an_error() {
        let source = InMemoryDataSource::new();
        assert_eq!(source.max_gen(), 0);
        assert!(matches!(
            source.read_evolution(1),
            Err(DataError::MissingGeneration { generation: 1 })
        ));
    }

    #[test]
    fn genotype_requires_known_generation() {
        let mut source = InMemoryDataSource::synthetic(1, 2, 1, 1);
        assert!(source.set_genotype(9, vec![1.0]).is_err());
        source.set_genotype(2, vec![1.0, 2.0]).unwrap();
        assert_eq!(source.read_best_genotype(2).unwrap(), Some(vec![1.0, 2.0]));
    }
}
