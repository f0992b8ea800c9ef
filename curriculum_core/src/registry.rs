//! Named collection of specialists driven in lockstep with the training loop.
//!
//! The registry is the single write path for the shared generation value: the
//! driver calls [`SpecialistRegistry::set_generation`] and the registry
//! broadcasts it to every specialist. Data, processing and persistence calls
//! fan out the same way, one specialist at a time in registration order.
//!
//! On-disk layout under the registry root:
//!
//! ```text
//! <root>/registry.ckpt           manifest: generation + specialist names
//! <root>/specialists/<name>.ckpt full specialist state
//! <root>/confusion.jsonl         lightweight confusion-matrix stream
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checkpoint::{check_version, read_snapshot, write_snapshot, CheckpointError};
use crate::condition::Condition;
use crate::confusion::{ConfusionOutcome, ConfusionRow};
use crate::error::{SpecialistError, SpecialistResult};
use crate::logging::append_json_lines;
use crate::model::CurriculumModel;
use crate::specialist::{Specialist, SpecialistConfig};

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegistryManifest {
    version: u32,
    name: String,
    generation: u64,
    specialists: Vec<String>,
}

/// Build `sp<batch>` configurations sharing one start generation, each with
/// equal fit and score batch sizes.
pub fn batch_specialists(
    start_generation: u64,
    batch_sizes: &[usize],
    generation_trials: usize,
    fit_historical: bool,
) -> Vec<(String, SpecialistConfig)> {
    batch_sizes
        .iter()
        .map(|&batch| {
            (
                format!("sp{batch}"),
                SpecialistConfig::new(start_generation, batch, batch, generation_trials)
                    .with_historical(fit_historical),
            )
        })
        .collect()
}

#[derive(Debug)]
pub struct SpecialistRegistry {
    name: String,
    root: PathBuf,
    generation: u64,
    specialists: Vec<Specialist>,
}

impl SpecialistRegistry {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            generation: 0,
            specialists: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("registry.ckpt")
    }

    pub fn specialists_dir(&self) -> PathBuf {
        self.root.join("specialists")
    }

    pub fn stream_path(&self) -> PathBuf {
        self.root.join("confusion.jsonl")
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specialists.iter().map(Specialist::name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Specialist> {
        self.specialists.iter().find(|s| s.name() == name)
    }

    /// Like [`SpecialistRegistry::get`], but a missing name is an error.
    pub fn specialist(&self, name: &str) -> SpecialistResult<&Specialist> {
        self.get(name)
            .ok_or_else(|| SpecialistError::unknown_specialist(name))
    }

    pub fn specialists(&self) -> impl Iterator<Item = &Specialist> {
        self.specialists.iter()
    }

    /// Register a specialist running the built-in model from `config`.
    pub fn add_specialist(
        &mut self,
        name: impl Into<String>,
        config: SpecialistConfig,
    ) -> SpecialistResult<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let specialist = Specialist::configure(name, config)?;
        self.insert(specialist);
        Ok(())
    }

    /// Register a specialist around a caller-supplied model.
    pub fn add_specialist_with_model(
        &mut self,
        name: impl Into<String>,
        config: SpecialistConfig,
        model: Box<dyn CurriculumModel>,
    ) -> SpecialistResult<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let specialist = Specialist::with_model(name, config, model)?;
        self.insert(specialist);
        Ok(())
    }

    pub fn add_specialists<I>(&mut self, configs: I) -> SpecialistResult<()>
    where
        I: IntoIterator<Item = (String, SpecialistConfig)>,
    {
        for (name, config) in configs {
            self.add_specialist(name, config)?;
        }
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> SpecialistResult<()> {
        if self.get(name).is_some() {
            return Err(SpecialistError::duplicate_name(name));
        }
        Ok(())
    }

    fn insert(&mut self, mut specialist: Specialist) {
        specialist.set_generation(self.generation);
        info!(
            registry = %self.name,
            specialist = specialist.name(),
            start_generation = specialist.config().start_generation,
            fit_batch_size = specialist.config().fit_batch_size,
            score_batch_size = specialist.config().score_batch_size,
            "registered specialist"
        );
        self.specialists.push(specialist);
    }

    /// Broadcast the current generation to every specialist.
    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
        for specialist in &mut self.specialists {
            specialist.set_generation(generation);
        }
    }

    /// Hand this generation's conditions to every active specialist. Returns
    /// the number of specialists that accepted them.
    pub fn update_data(&mut self, conditions: &[Condition]) -> usize {
        let mut receivers = 0;
        for specialist in self.specialists.iter_mut().filter(|s| s.is_active()) {
            specialist.ingest(conditions);
            receivers += 1;
        }
        receivers
    }

    /// Run `process()` on every specialist in registration order.
    ///
    /// Returns one outcome per active specialist that completed its scoring
    /// pass. Failures are logged and do not stop the remaining specialists.
    pub fn process_generation(&mut self) -> Vec<(String, ConfusionOutcome)> {
        let mut outcomes = Vec::with_capacity(self.specialists.len());
        for specialist in &mut self.specialists {
            match specialist.process() {
                Ok(Some(outcome)) => outcomes.push((specialist.name().to_string(), outcome)),
                Ok(None) => {}
                Err(err) if err.is_tolerable() => warn!(
                    registry = %self.name,
                    generation = self.generation,
                    "specialist skipped this generation: {err}"
                ),
                Err(err) => error!(
                    registry = %self.name,
                    generation = self.generation,
                    "specialist failed: {err}"
                ),
            }
        }
        outcomes
    }

    /// Persist the manifest and every specialist's full state.
    pub fn save(&self) -> SpecialistResult<()> {
        let dir = self.specialists_dir();
        for specialist in &self.specialists {
            specialist.save(&dir)?;
        }
        let manifest = RegistryManifest {
            version: MANIFEST_VERSION,
            name: self.name.clone(),
            generation: self.generation,
            specialists: self.names().into_iter().map(String::from).collect(),
        };
        write_snapshot(&manifest, self.manifest_path())
            .map_err(|err| SpecialistError::persistence(&self.name, err))?;
        info!(
            registry = %self.name,
            generation = self.generation,
            specialists = self.specialists.len(),
            "saved specialist state"
        );
        Ok(())
    }

    /// Append confusion rows not yet streamed. I/O failures are logged and
    /// the rows are retried on the next call. Returns the rows written.
    pub fn save_stg(&mut self) -> usize {
        let rows: Vec<ConfusionRow> = self
            .specialists
            .iter()
            .flat_map(|s| {
                s.tracker().unstreamed().iter().map(|outcome| ConfusionRow {
                    specialist: s.name().to_string(),
                    outcome: *outcome,
                })
            })
            .collect();

        match append_json_lines(self.stream_path(), &rows) {
            Ok(()) => {
                for specialist in &mut self.specialists {
                    specialist.tracker_mut().mark_streamed();
                }
                rows.len()
            }
            Err(err) => {
                warn!(
                    registry = %self.name,
                    path = %self.stream_path().display(),
                    "failed to append confusion stream: {err}"
                );
                0
            }
        }
    }

    /// Restore the manifest generation and every specialist's state.
    ///
    /// The registered specialists must match the manifest exactly.
    pub fn load(&mut self) -> SpecialistResult<()> {
        let manifest: RegistryManifest = read_snapshot(self.manifest_path())
            .map_err(|err| SpecialistError::persistence(&self.name, err))?;
        check_version(MANIFEST_VERSION, manifest.version)
            .map_err(|err| SpecialistError::persistence(&self.name, err))?;

        let registered: Vec<String> = self.names().into_iter().map(String::from).collect();
        if manifest.specialists != registered {
            return Err(SpecialistError::persistence(
                &self.name,
                CheckpointError::InvalidFormat(format!(
                    "manifest lists {:?} but registry holds {:?}",
                    manifest.specialists, registered
                )),
            ));
        }

        let dir = self.specialists_dir();
        for specialist in &mut self.specialists {
            specialist.load(&dir)?;
        }
        self.set_generation(manifest.generation);
        info!(
            registry = %self.name,
            generation = self.generation,
            "restored specialist state"
        );
        Ok(())
    }
}
