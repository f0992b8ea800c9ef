use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{check_version, read_snapshot, write_snapshot, CheckpointError, Checkpointable};
use crate::condition::EvolutionRecord;

/// Fitness value meaning "no result yet".
pub const FITNESS_SENTINEL: f64 = -999_999_999.0;

/// Values appended to [`RunState::stat`] per processed generation:
/// steps, bestfit, bestgfit, bestsam, avg, weightsize.
pub const STAT_WIDTH: usize = 6;

pub const RUN_STATE_FILE: &str = "run_state.ckpt";

const RUN_STATE_VERSION: u32 = 1;

/// Lifecycle of a [`super::TrainingLoopDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    Unstarted,
    Running,
    Checkpointed,
    TerminatedByLimit,
    TerminatedByEnd,
    /// Generation data could not be read; the last processed generation was
    /// saved.
    TerminatedByError,
}

impl DriverState {
    pub fn is_terminated(self) -> bool {
        matches!(
            self,
            Self::TerminatedByLimit | Self::TerminatedByEnd | Self::TerminatedByError
        )
    }
}

/// Everything the driver must carry across generations and restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub seed: u64,
    /// Last generation whose data was processed.
    pub generation: u64,
    pub steps: u64,
    pub best_fitness: f64,
    pub best_genotype: Option<Vec<f64>>,
    pub best_post_fitness: f64,
    pub best_post_genotype: Option<Vec<f64>>,
    pub best_sample_fitness: f64,
    pub avg_fitness: f64,
    pub avg_param_norm: f64,
    pub stat: Vec<f64>,
    pub last_checkpoint: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct RunStateSnapshot {
    version: u32,
    state: RunState,
}

impl RunState {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            generation: 0,
            steps: 0,
            best_fitness: FITNESS_SENTINEL,
            best_genotype: None,
            best_post_fitness: FITNESS_SENTINEL,
            best_post_genotype: None,
            best_sample_fitness: FITNESS_SENTINEL,
            avg_fitness: FITNESS_SENTINEL,
            avg_param_norm: 0.0,
            stat: Vec::new(),
            last_checkpoint: Utc::now(),
        }
    }

    /// Back to a fresh run for the same seed.
    pub fn reset(&mut self) {
        *self = Self::new(self.seed);
    }

    pub fn has_result(&self) -> bool {
        self.best_fitness > FITNESS_SENTINEL
    }

    /// Fold one generation's statistics into the run.
    ///
    /// Best fitness values are running maxima. `genotype` replaces the
    /// stored best genotype only when the matching fitness improves.
    /// Returns whether the best fitness improved.
    pub fn record(
        &mut self,
        generation: u64,
        evolution: &EvolutionRecord,
        genotype: Option<Vec<f64>>,
    ) -> bool {
        self.generation = generation;
        self.steps = evolution.steps;
        self.best_sample_fitness = evolution.best_sample_fit;
        self.avg_fitness = evolution.avgfit;
        self.avg_param_norm = evolution.avg_param_norm;

        if evolution.bestgfit > self.best_post_fitness {
            self.best_post_fitness = evolution.bestgfit;
            if genotype.is_some() {
                self.best_post_genotype = genotype.clone();
            }
        }

        let improved = evolution.bestfit > self.best_fitness;
        if improved {
            self.best_fitness = evolution.bestfit;
            if genotype.is_some() {
                self.best_genotype = genotype;
            }
        }

        self.stat.extend_from_slice(&[
            self.steps as f64,
            self.best_fitness,
            self.best_post_fitness,
            self.best_sample_fitness,
            self.avg_fitness,
            self.avg_param_norm,
        ]);
        improved
    }

    /// Statistics per processed generation, oldest first.
    pub fn stat_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.stat.chunks_exact(STAT_WIDTH)
    }

    pub fn checkpoint_due(&self, now: DateTime<Utc>, every: Duration) -> bool {
        if every.is_zero() {
            return true;
        }
        match (now - self.last_checkpoint).to_std() {
            Ok(elapsed) => elapsed >= every,
            Err(_) => false,
        }
    }
}

impl Checkpointable for RunState {
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let snapshot = RunStateSnapshot {
            version: RUN_STATE_VERSION,
            state: self.clone(),
        };
        write_snapshot(&snapshot, path)
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let snapshot: RunStateSnapshot = read_snapshot(path)?;
        check_version(RUN_STATE_VERSION, snapshot.version)?;
        let state = snapshot.state;
        if state.stat.len() % STAT_WIDTH != 0 {
            return Err(CheckpointError::InvalidFormat(format!(
                "statistics vector of length {} is not a multiple of {STAT_WIDTH}",
                state.stat.len()
            )));
        }
        Ok(state)
    }
}
