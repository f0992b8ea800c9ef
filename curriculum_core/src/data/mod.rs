//! Per-generation data produced by the evolutionary run.
//!
//! The training-loop driver pulls one generation at a time through the
//! [`GenerationDataSource`] trait. Generations are numbered from 1 up to and
//! including [`GenerationDataSource::max_gen`].

pub mod jsonl;
pub mod memory;

use thiserror::Error;

use crate::condition::{Condition, EvolutionRecord};

pub use jsonl::JsonlDataSource;
pub use memory::InMemoryDataSource;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error while reading generation data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed generation data in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    #[error("No data recorded for generation {generation}")]
    MissingGeneration { generation: u64 },
}

/// Read access to the raw per-generation store.
pub trait GenerationDataSource {
    /// Last generation with recorded data.
    fn max_gen(&self) -> u64;

    fn read_evolution(&self, generation: u64) -> Result<EvolutionRecord, DataError>;

    fn read_conditions(&self, generation: u64) -> Result<Vec<Condition>, DataError>;

    /// Genotype of the best individual found up to `generation`, when the
    /// store keeps one.
    fn read_best_genotype(&self, generation: u64) -> Result<Option<Vec<f64>>, DataError> {
        let _ = generation;
        Ok(None)
    }
}

impl<T: GenerationDataSource + ?Sized> GenerationDataSource for &T {
    fn max_gen(&self) -> u64 {
        (**self).max_gen()
    }

    fn read_evolution(&self, generation: u64) -> Result<EvolutionRecord, DataError> {
        (**self).read_evolution(generation)
    }

    fn read_conditions(&self, generation: u64) -> Result<Vec<Condition>, DataError> {
        (**self).read_conditions(generation)
    }

    fn read_best_genotype(&self, generation: u64) -> Result<Option<Vec<f64>>, DataError> {
        (**self).read_best_genotype(generation)
    }
}
