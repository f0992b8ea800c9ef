//! Generation store kept as two JSON-lines files under a run directory.
//!
//! `evolution.jsonl` holds one line per generation:
//! `{"gen": 3, "steps": ..., "bestfit": ..., ..., "genotype": [..]}`.
//! `conditions.jsonl` holds one line per generation:
//! `{"gen": 3, "conditions": [[f, f, outcome], ...]}`.
//! A later line for the same generation replaces an earlier one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataError, GenerationDataSource};
use crate::condition::{Condition, EvolutionRecord};
use crate::logging::{append_json_line, read_json_lines, JsonLinesError};

pub const EVOLUTION_FILE: &str = "evolution.jsonl";
pub const CONDITIONS_FILE: &str = "conditions.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvolutionLine {
    gen: u64,
    #[serde(flatten)]
    record: EvolutionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genotype: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConditionsLine {
    gen: u64,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
pub struct JsonlDataSource {
    root: PathBuf,
    evolution: BTreeMap<u64, EvolutionRecord>,
    genotypes: BTreeMap<u64, Vec<f64>>,
    conditions: BTreeMap<u64, Vec<Condition>>,
}

fn load_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, DataError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_json_lines(path).map_err(|err| match err {
        JsonLinesError::Malformed { line, source } => DataError::Parse {
            file: path.display().to_string(),
            line,
            message: source.to_string(),
        },
        JsonLinesError::Io(err) => DataError::Io(err),
    })
}

impl JsonlDataSource {
    /// Open the store under `root`. Missing files read as an empty run.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, DataError> {
        let root = root.as_ref().to_path_buf();
        let mut source = Self {
            root,
            evolution: BTreeMap::new(),
            genotypes: BTreeMap::new(),
            conditions: BTreeMap::new(),
        };

        for line in load_lines::<EvolutionLine>(&source.evolution_path())? {
            source.evolution.insert(line.gen, line.record);
            if let Some(genotype) = line.genotype {
                source.genotypes.insert(line.gen, genotype);
            }
        }
        for line in load_lines::<ConditionsLine>(&source.conditions_path())? {
            source.conditions.insert(line.gen, line.conditions);
        }

        debug!(
            root = %source.root.display(),
            generations = source.evolution.len(),
            "opened generation store"
        );
        Ok(source)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn evolution_path(&self) -> PathBuf {
        self.root.join(EVOLUTION_FILE)
    }

    pub fn conditions_path(&self) -> PathBuf {
        self.root.join(CONDITIONS_FILE)
    }

    /// Record one generation on disk and in the in-memory index.
    pub fn append_generation(
        &mut self,
        generation: u64,
        record: EvolutionRecord,
        conditions: Vec<Condition>,
        genotype: Option<Vec<f64>>,
    ) -> Result<(), DataError> {
        append_json_line(
            self.evolution_path(),
            &EvolutionLine {
                gen: generation,
                record,
                genotype: genotype.clone(),
            },
        )?;
        append_json_line(
            self.conditions_path(),
            &ConditionsLine {
                gen: generation,
                conditions: conditions.clone(),
            },
        )?;

        self.evolution.insert(generation, record);
        match genotype {
            Some(genotype) => {
                self.genotypes.insert(generation, genotype);
            }
            None => {
                self.genotypes.remove(&generation);
            }
        }
        self.conditions.insert(generation, conditions);
        Ok(())
    }

    /// Copy every generation of another source into this store.
    pub fn import<S: GenerationDataSource>(&mut self, source: &S) -> Result<u64, DataError> {
        let mut imported = 0;
        for generation in 1..=source.max_gen() {
            let record = source.read_evolution(generation)?;
            let conditions = source.read_conditions(generation)?;
            let genotype = source.read_best_genotype(generation)?;
            self.append_generation(generation, record, conditions, genotype)?;
            imported += 1;
        }
        Ok(imported)
    }
}

impl GenerationDataSource for JsonlDataSource {
    fn max_gen(&self) -> u64 {
        self.evolution.keys().next_back().copied().unwrap_or(0)
    }

    fn read_evolution(&self, generation: u64) -> Result<EvolutionRecord, DataError> {
        self.evolution
            .get(&generation)
            .copied()
            .ok_or(DataError::MissingGeneration { generation })
    }

    /// A generation with statistics but no conditions line yields no
    /// conditions.
    fn read_conditions(&self, generation: u64) -> Result<Vec<Condition>, DataError> {
        if !self.evolution.contains_key(&generation) && !self.conditions.contains_key(&generation) {
            return Err(DataError::MissingGeneration { generation });
        }
        Ok(self.conditions.get(&generation).cloned().unwrap_or_default())
    }

    fn read_best_genotype(&self, generation: u64) -> Result<Option<Vec<f64>>, DataError> {
        Ok(self.genotypes.get(&generation).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataSource;

    fn record(steps: u64) -> EvolutionRecord {
        EvolutionRecord {
            steps,
            bestfit: 1.0,
            bestgfit: 0.5,
            best_sample_fit: 0.75,
            avgfit: 0.25,
            avg_param_norm: 0.1,
        }
    }

    #[test]
    fn missing_directory_reads_as_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonlDataSource::open(dir.path().join("absent")).unwrap();
        assert_eq!(source.max_gen(), 0);
    }

    #[test]
    fn appended_generations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = JsonlDataSource::open(dir.path()).unwrap();
        source
            .append_generation(1, record(10), vec![Condition::new(vec![0.1, 1.0])], None)
            .unwrap();
        source
            .append_generation(2, record(20), vec![], Some(vec![3.0]))
            .unwrap();

        let reopened = JsonlDataSource::open(dir.path()).unwrap();
        assert_eq!(reopened.max_gen(), 2);
        assert_eq!(reopened.read_evolution(2).unwrap().steps, 20);
        assert_eq!(reopened.read_conditions(1).unwrap().len(), 1);
        assert!(reopened.read_conditions(2).unwrap().is_empty());
        assert_eq!(reopened.read_best_genotype(2).unwrap(), Some(vec![3.0]));
        assert_eq!(reopened.read_best_genotype(1).unwrap(), None);
        assert!(reopened.read_conditions(3).is_err());
    }

    #[test]
    fn evolution_line_uses_flat_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = JsonlDataSource::open(dir.path()).unwrap();
        source.append_generation(4, record(7), vec![], None).unwrap();
        let text = std::fs::read_to_string(source.evolution_path()).unwrap();
        assert!(text.starts_with("{\"gen\":4,\"steps\":7,"));
        assert!(!text.contains("genotype"));
    }

    #[test]
    fn import_copies_every_generation() {
        let dir = tempfile::tempdir().unwrap();
        let memory = InMemoryDataSource::synthetic(3, 4, 5, 2);
        let mut source = JsonlDataSource::open(dir.path()).unwrap();
        assert_eq!(source.import(&memory).unwrap(), 4);
        let reopened = JsonlDataSource::open(dir.path()).unwrap();
        assert_eq!(reopened.max_gen(), 4);
        let read = reopened.read_conditions(2).unwrap();
        let expected = memory.read_conditions(2).unwrap();
        assert_eq!(read.len(), expected.len());
        for (a, b) in read.iter().zip(&expected) {
            for (x, y) in a.values().iter().zip(b.values()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(EVOLUTION_FILE), "{\"gen\":1}\nnot json\n").unwrap();
        let err = JsonlDataSource::open(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 1, .. }));
    }

    #[test]
    fn parse_error_counts_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONDITIONS_FILE), "\n\nnot json\n").unwrap();
        match JsonlDataSource::open(dir.path()).unwrap_err() {
            DataError::Parse { file, line, message } => {
                assert!(file.ends_with(CONDITIONS_FILE));
                assert_eq!(line, 3);
                assert!(!message.starts_with("line"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
