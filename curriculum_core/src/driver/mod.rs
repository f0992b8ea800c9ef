//! Generation-indexed training loop.
//!
//! The driver walks the generation data source one generation at a time,
//! broadcasts the generation to the specialist registry, feeds it the
//! generation's conditions, streams the confusion rows and reports progress.
//! Full checkpoints (registry plus [`RunState`]) are written periodically and
//! once more when the loop ends.

pub mod progress;
pub mod state;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::condition::{Condition, EvolutionRecord};
use crate::config::Hyperparameters;
use crate::data::{DataError, GenerationDataSource};
use crate::error::SpecialistError;
use crate::registry::SpecialistRegistry;

pub use progress::{simulation_time, ProgressLine};
pub use state::{DriverState, RunState, FITNESS_SENTINEL, RUN_STATE_FILE, STAT_WIDTH};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Generation data unavailable: {0}")]
    Data(#[from] DataError),
    #[error(transparent)]
    Specialist(#[from] SpecialistError),
    #[error("Run state checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Run state belongs to seed {found} but the driver runs seed {expected}")]
    SeedMismatch { expected: u64, found: u64 },
    #[error("Run state is at generation {state} but the registry is at generation {registry}")]
    InconsistentCheckpoint { state: u64, registry: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverOptions {
    pub seed: u64,
    /// Directory receiving the run-state checkpoint.
    pub checkpoint_dir: PathBuf,
    /// Stop once the generation counter reaches this value. Zero means no
    /// limit.
    pub test_limit_stop: Option<u64>,
    /// Interval between periodic full checkpoints; `saveeach` when unset.
    pub save_every: Option<Duration>,
}

impl DriverOptions {
    pub fn new(seed: u64, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed,
            checkpoint_dir: checkpoint_dir.into(),
            test_limit_stop: None,
            save_every: None,
        }
    }

    pub fn with_test_limit(mut self, limit: u64) -> Self {
        self.test_limit_stop = (limit > 0).then_some(limit);
        self
    }

    fn active_limit(&self) -> Option<u64> {
        self.test_limit_stop.filter(|&limit| limit > 0)
    }

    pub fn with_save_every(mut self, every: Duration) -> Self {
        self.save_every = Some(every);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Loop iterations, counting the one that hit the generation limit.
    pub iterations: u64,
    pub generations_processed: u64,
    pub termination: DriverState,
    /// Full checkpoints written, periodic ones included.
    pub full_saves: u32,
    pub elapsed: Duration,
}

type ProgressSink<'a> = Box<dyn FnMut(&ProgressLine) + 'a>;

pub struct TrainingLoopDriver<'a, S> {
    source: S,
    registry: &'a mut SpecialistRegistry,
    hyperparameters: Hyperparameters,
    options: DriverOptions,
    state: DriverState,
    progress: Option<ProgressSink<'a>>,
}

impl<'a, S: GenerationDataSource> TrainingLoopDriver<'a, S> {
    pub fn new(
        source: S,
        registry: &'a mut SpecialistRegistry,
        hyperparameters: Hyperparameters,
        options: DriverOptions,
    ) -> Self {
        Self {
            source,
            registry,
            hyperparameters,
            options,
            state: DriverState::Unstarted,
            progress: None,
        }
    }

    /// Receive every progress line as it is produced.
    pub fn with_progress<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&ProgressLine) + 'a,
    {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn registry(&self) -> &SpecialistRegistry {
        self.registry
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn run_state_path(&self) -> PathBuf {
        self.options.checkpoint_dir.join(RUN_STATE_FILE)
    }

    fn save_interval(&self) -> Duration {
        self.options
            .save_every
            .unwrap_or_else(|| Duration::from_secs(self.hyperparameters.save_each_minutes * 60))
    }

    /// Environment seed used to evaluate the current generation.
    pub fn evaluation_seed(&self, state: &RunState) -> u64 {
        state
            .seed
            .wrapping_add(state.generation.wrapping_mul(self.hyperparameters.sample_size as u64))
    }

    /// Reload the last full checkpoint into the registry and return the
    /// run state to continue from.
    pub fn restore(&mut self) -> Result<RunState, DriverError> {
        let state = RunState::load_checkpoint(self.run_state_path())?;
        if state.seed != self.options.seed {
            return Err(DriverError::SeedMismatch {
                expected: self.options.seed,
                found: state.seed,
            });
        }
        self.registry.load()?;
        if self.registry.generation() != state.generation {
            return Err(DriverError::InconsistentCheckpoint {
                state: state.generation,
                registry: self.registry.generation(),
            });
        }
        info!(
            seed = state.seed,
            generation = state.generation,
            "resuming from checkpoint"
        );
        Ok(state)
    }

    fn checkpoint(&mut self, state: &mut RunState) -> Result<(), DriverError> {
        self.state = DriverState::Checkpointed;
        self.registry.save()?;
        state.last_checkpoint = Utc::now();
        state.save_checkpoint(self.run_state_path())?;
        debug!(
            generation = state.generation,
            path = %self.run_state_path().display(),
            "checkpoint written"
        );
        Ok(())
    }

    fn read_generation(
        &self,
        generation: u64,
    ) -> Result<(EvolutionRecord, Vec<Condition>, Option<Vec<f64>>), DataError> {
        let evolution = self.source.read_evolution(generation)?;
        let conditions = self.source.read_conditions(generation)?;
        let genotype = self.source.read_best_genotype(generation)?;
        Ok((evolution, conditions, genotype))
    }

    /// Save everything up to the last processed generation, then surface the
    /// data error.
    fn abort_on_data_error(&mut self, state: &mut RunState, err: DataError) -> DriverError {
        error!(
            generation = state.generation + 1,
            "generation data unavailable, saving generation {}: {err}",
            state.generation
        );
        self.registry.set_generation(state.generation);
        let saved = self.checkpoint(state);
        self.state = DriverState::TerminatedByError;
        match saved {
            Ok(()) => DriverError::Data(err),
            Err(save_err) => {
                error!("checkpoint after data error failed: {save_err}");
                save_err
            }
        }
    }

    fn log_banner(&self, state: &RunState) {
        let hp = &self.hyperparameters;
        info!(
            seed = state.seed,
            maxmsteps = hp.max_million_steps(),
            samplesize = hp.sample_size,
            stepsize = hp.step_size,
            noise_std_dev = hp.noise_std_dev,
            wdecay = hp.weight_decay.code(),
            symseed = hp.symmetric_seed,
            start_generation = state.generation,
            "starting evolution"
        );
    }

    /// Run until the data source is exhausted or the generation limit is
    /// reached, then write one final full checkpoint.
    ///
    /// When the limit stops the loop, the generation that tripped it is not
    /// processed and `state.generation` is left at the last processed one, so
    /// a resumed run picks it up. A data error mid-run saves the same way
    /// before it is returned.
    pub fn run(&mut self, state: &mut RunState) -> Result<RunReport, DriverError> {
        if state.seed != self.options.seed {
            return Err(DriverError::SeedMismatch {
                expected: self.options.seed,
                found: state.seed,
            });
        }

        let started = Instant::now();
        let save_every = self.save_interval();
        let end = self.source.max_gen();
        let limit = self.options.active_limit();
        self.state = DriverState::Running;
        state.last_checkpoint = Utc::now();
        self.registry.set_generation(state.generation);
        self.log_banner(state);

        let mut iterations = 0;
        let mut processed = 0;
        let mut full_saves = 0;
        let mut termination = DriverState::TerminatedByEnd;

        while state.generation < end {
            let generation = state.generation + 1;
            iterations += 1;
            self.registry.set_generation(generation);

            let (evolution, conditions, genotype) = match self.read_generation(generation) {
                Ok(data) => data,
                Err(err) => return Err(self.abort_on_data_error(state, err)),
            };

            if let Some(limit) = limit {
                if generation >= limit {
                    info!(generation, limit, "generation limit reached");
                    self.registry.set_generation(state.generation);
                    termination = DriverState::TerminatedByLimit;
                    break;
                }
            }

            state.record(generation, &evolution, genotype);

            let receivers = self.registry.update_data(&conditions);
            let outcomes = self.registry.process_generation();
            let streamed = self.registry.save_stg();
            processed += 1;
            debug!(
                generation,
                evaluation_seed = self.evaluation_seed(state),
                conditions = conditions.len(),
                receivers,
                outcomes = outcomes.len(),
                streamed,
                "generation processed"
            );

            let line = ProgressLine::from_state(state, end);
            if let Some(sink) = self.progress.as_mut() {
                sink(&line);
            }

            if state.checkpoint_due(Utc::now(), save_every) {
                self.checkpoint(state)?;
                full_saves += 1;
                self.state = DriverState::Running;
            }
        }

        self.checkpoint(state)?;
        full_saves += 1;
        self.state = termination;

        let elapsed = started.elapsed();
        Ok(RunReport {
            iterations,
            generations_processed: processed,
            termination,
            full_saves,
            elapsed,
        })
    }
}

/// Whether a previous run left a checkpoint under `dir`.
pub fn has_checkpoint<P: AsRef<Path>>(dir: P) -> bool {
    dir.as_ref().join(RUN_STATE_FILE).is_file()
}
