//! Curriculum specialists.
//!
//! A [`Specialist`] owns one curriculum model, a rolling [`BatchWindow`] of
//! condition samples and a [`ConfusionTracker`]. The registry drives it once
//! per generation:
//!
//! 1. `set_generation(g)`: bookkeeping only, used for activation gating.
//! 2. `ingest(conditions)`: pure accumulation; dropped while inactive.
//! 3. `process()`: score the oldest whole score batches with the current
//!    model (prefit), refit if enough scored data accumulated, re-score the
//!    same frozen batch (postfit) and record one [`ConfusionOutcome`].

pub mod window;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::checkpoint::{check_version, read_snapshot, write_snapshot, CheckpointError};
use crate::condition::Condition;
use crate::confusion::{ConfusionCounts, ConfusionOutcome, ConfusionTracker};
use crate::error::{SpecialistError, SpecialistResult};
use crate::model::{CurriculumModel, ModelConfig, ModelError, ModelParameters};

pub use window::BatchWindow;

const SNAPSHOT_VERSION: u32 = 2;

/// Static configuration of a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistConfig {
    /// Generations before this one are ignored.
    pub start_generation: u64,
    /// Scored samples needed to trigger a refit.
    pub fit_batch_size: usize,
    /// Pending samples needed to trigger a scoring pass.
    pub score_batch_size: usize,
    /// Conditions expected per generation.
    pub generation_trials: usize,
    /// Refit on every sample ever scored instead of only the latest ones.
    #[serde(default)]
    pub fit_historical_data: bool,
    #[serde(default)]
    pub model: ModelConfig,
}

impl SpecialistConfig {
    pub fn new(
        start_generation: u64,
        fit_batch_size: usize,
        score_batch_size: usize,
        generation_trials: usize,
    ) -> Self {
        Self {
            start_generation,
            fit_batch_size,
            score_batch_size,
            generation_trials,
            fit_historical_data: false,
            model: ModelConfig::default(),
        }
    }

    pub fn with_historical(mut self, fit_historical_data: bool) -> Self {
        self.fit_historical_data = fit_historical_data;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn validate(&self) -> SpecialistResult<()> {
        let sizes = [
            ("fit_batch_size", self.fit_batch_size),
            ("score_batch_size", self.score_batch_size),
            ("generation_trials", self.generation_trials),
        ];
        for (parameter, value) in sizes {
            if value == 0 {
                return Err(SpecialistError::configuration(
                    parameter,
                    value,
                    "must be > 0",
                ));
            }
        }
        if !self.model.outcome_threshold.is_finite() {
            return Err(SpecialistError::configuration(
                "model.outcome_threshold",
                self.model.outcome_threshold,
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Persisted form of a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SpecialistSnapshot {
    version: u32,
    name: String,
    generation: u64,
    start_generation: u64,
    fit_batch_size: usize,
    score_batch_size: usize,
    fit_historical_data: bool,
    pending: Vec<Condition>,
    fit_pool: Vec<Condition>,
    since_fit: usize,
    ingested: usize,
    feature_width: Option<usize>,
    rejected: u64,
    fit_count: u64,
    trial_mismatches: u64,
    model: ModelParameters,
    outcomes: Vec<ConfusionOutcome>,
}

#[derive(Debug)]
pub struct Specialist {
    name: String,
    config: SpecialistConfig,
    generation: u64,
    window: BatchWindow,
    model: Box<dyn CurriculumModel>,
    tracker: ConfusionTracker,
    ingested: usize,
    /// Feature count fixed by the first accepted condition.
    feature_width: Option<usize>,
    rejected: u64,
    fit_count: u64,
    trial_mismatches: u64,
}

impl Specialist {
    /// Create a specialist running the built-in model named by `config.model`.
    pub fn configure(name: impl Into<String>, config: SpecialistConfig) -> SpecialistResult<Self> {
        let model = config.model.build();
        Self::with_model(name, config, model)
    }

    /// Create a specialist around a caller-supplied model.
    pub fn with_model(
        name: impl Into<String>,
        config: SpecialistConfig,
        model: Box<dyn CurriculumModel>,
    ) -> SpecialistResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SpecialistError::configuration(
                "name",
                &name,
                "must not be empty",
            ));
        }
        config.validate()?;
        Ok(Self {
            window: BatchWindow::new(config.fit_historical_data),
            name,
            config,
            generation: 0,
            model,
            tracker: ConfusionTracker::new(),
            ingested: 0,
            feature_width: None,
            rejected: 0,
            fit_count: 0,
            trial_mismatches: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SpecialistConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.generation >= self.config.start_generation
    }

    pub fn window(&self) -> &BatchWindow {
        &self.window
    }

    /// Samples waiting to be scored.
    pub fn pending(&self) -> usize {
        self.window.pending_len()
    }

    /// Scored samples kept for fitting.
    pub fn retained(&self) -> usize {
        self.window.fit_pool().len()
    }

    pub fn tracker(&self) -> &ConfusionTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ConfusionTracker {
        &mut self.tracker
    }

    pub fn model(&self) -> &dyn CurriculumModel {
        self.model.as_ref()
    }

    /// Successful refits so far.
    pub fn fit_count(&self) -> u64 {
        self.fit_count
    }

    /// Conditions dropped on ingest for an empty layout or a feature count
    /// that differs from the first accepted condition.
    pub fn rejected_conditions(&self) -> u64 {
        self.rejected
    }

    pub fn feature_width(&self) -> Option<usize> {
        self.feature_width
    }

    /// Generations whose ingested count differed from `generation_trials`.
    pub fn trial_mismatches(&self) -> u64 {
        self.trial_mismatches
    }

    /// Record the current generation. Moving to a new generation resets the
    /// per-generation ingest counter; the model is untouched.
    pub fn set_generation(&mut self, generation: u64) {
        if generation != self.generation {
            self.ingested = 0;
        }
        self.generation = generation;
    }

    /// Append conditions to the window. Returns how many were accepted.
    ///
    /// Every condition must carry an outcome and the same feature count as
    /// the first one this specialist accepted; others are dropped.
    pub fn ingest(&mut self, conditions: &[Condition]) -> usize {
        if !self.is_active() {
            return 0;
        }
        let mut accepted = Vec::with_capacity(conditions.len());
        let mut dropped = 0usize;
        for condition in conditions {
            let width = condition.feature_count();
            let fits = condition.outcome().is_some()
                && *self.feature_width.get_or_insert(width) == width;
            if fits {
                accepted.push(condition.clone());
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.rejected += dropped as u64;
            warn!(
                specialist = %self.name,
                generation = self.generation,
                dropped,
                expected_features = ?self.feature_width,
                "dropping malformed conditions"
            );
        }
        self.window.push(&accepted);
        self.ingested += accepted.len();
        accepted.len()
    }

    /// Check that the current generation delivered the expected trial count.
    pub fn validate_generation_trials(&self) -> SpecialistResult<()> {
        if self.ingested == self.config.generation_trials {
            Ok(())
        } else {
            Err(SpecialistError::insufficient_data(
                &self.name,
                self.generation,
                self.config.generation_trials,
                self.ingested,
            ))
        }
    }

    /// Run this generation's score/fit/score cycle.
    ///
    /// Returns `Ok(None)` while inactive. A trial-count mismatch is logged and
    /// tolerated. A failed refit keeps the previous model and still closes the
    /// fit round, so a bad pool is never offered twice. A failed scoring
    /// pass drops the batch and is returned as an error without recording an
    /// outcome.
    pub fn process(&mut self) -> SpecialistResult<Option<ConfusionOutcome>> {
        if !self.is_active() {
            return Ok(None);
        }

        if let Err(err) = self.validate_generation_trials() {
            self.trial_mismatches += 1;
            warn!("{err}; continuing with the conditions that arrived");
        }

        let batch = self.window.take_score_batch(self.config.score_batch_size);
        let prefit = self.tally(&batch)?;

        let mut refitted = false;
        if self.window.fit_ready(self.config.fit_batch_size) {
            match self.model.fit(self.window.fit_pool()) {
                Ok(()) => {
                    debug!(
                        specialist = %self.name,
                        generation = self.generation,
                        samples = self.window.fit_pool().len(),
                        "refitted curriculum model"
                    );
                    self.fit_count += 1;
                    refitted = true;
                }
                Err(err) => warn!(
                    specialist = %self.name,
                    generation = self.generation,
                    "refit failed, keeping previous model: {err}"
                ),
            }
            self.window.finish_fit();
        }

        let postfit = if refitted { self.tally(&batch)? } else { prefit };
        self.window.retire(batch);

        let outcome = ConfusionOutcome {
            generation: self.generation,
            prefit,
            postfit,
        };
        self.tracker.record(outcome)?;
        Ok(Some(outcome))
    }

    fn tally(&self, batch: &[Condition]) -> SpecialistResult<ConfusionCounts> {
        if batch.is_empty() {
            return Ok(ConfusionCounts::default());
        }
        let predicted = self
            .model
            .score(batch)
            .map_err(|err| SpecialistError::model(&self.name, err))?;
        if predicted.len() != batch.len() {
            return Err(SpecialistError::model(
                &self.name,
                ModelError::label_count(batch.len(), predicted.len()),
            ));
        }
        let truth: Vec<bool> = batch.iter().map(|s| self.model.ground_truth(s)).collect();
        Ok(ConfusionCounts::from_labels(&predicted, &truth))
    }

    /// Path of this specialist's checkpoint inside `dir`.
    pub fn checkpoint_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("{}.ckpt", self.name))
    }

    fn snapshot(&self) -> SpecialistSnapshot {
        SpecialistSnapshot {
            version: SNAPSHOT_VERSION,
            name: self.name.clone(),
            generation: self.generation,
            start_generation: self.config.start_generation,
            fit_batch_size: self.config.fit_batch_size,
            score_batch_size: self.config.score_batch_size,
            fit_historical_data: self.config.fit_historical_data,
            pending: self.window.pending().cloned().collect(),
            fit_pool: self.window.fit_pool().to_vec(),
            since_fit: self.window.since_fit(),
            ingested: self.ingested,
            feature_width: self.feature_width,
            rejected: self.rejected,
            fit_count: self.fit_count,
            trial_mismatches: self.trial_mismatches,
            model: self.model.parameters(),
            outcomes: self.tracker.rows().to_vec(),
        }
    }

    /// Persist window, model parameters and tracker history to `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> SpecialistResult<()> {
        write_snapshot(&self.snapshot(), self.checkpoint_path(dir))
            .map_err(|err| SpecialistError::persistence(&self.name, err))
    }

    /// Restore state written by [`Specialist::save`] into this instance.
    ///
    /// The snapshot must belong to a specialist with the same name and batch
    /// configuration.
    pub fn load(&mut self, dir: impl AsRef<Path>) -> SpecialistResult<()> {
        let path = self.checkpoint_path(dir);
        let snapshot: SpecialistSnapshot =
            read_snapshot(&path).map_err(|err| SpecialistError::persistence(&self.name, err))?;
        self.apply(snapshot)
            .map_err(|err| SpecialistError::persistence(&self.name, err))?;
        Ok(())
    }

    fn apply(&mut self, snapshot: SpecialistSnapshot) -> Result<(), CheckpointError> {
        check_version(SNAPSHOT_VERSION, snapshot.version)?;
        let expected = (
            self.name.as_str(),
            self.config.start_generation,
            self.config.fit_batch_size,
            self.config.score_batch_size,
            self.config.fit_historical_data,
        );
        let found = (
            snapshot.name.as_str(),
            snapshot.start_generation,
            snapshot.fit_batch_size,
            snapshot.score_batch_size,
            snapshot.fit_historical_data,
        );
        if expected != found {
            return Err(CheckpointError::InvalidFormat(format!(
                "snapshot {found:?} does not match specialist {expected:?}"
            )));
        }

        let tracker = ConfusionTracker::from_rows(snapshot.outcomes)
            .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))?;
        self.model
            .restore(&snapshot.model)
            .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))?;

        self.generation = snapshot.generation;
        self.window = BatchWindow::from_parts(
            snapshot.pending,
            snapshot.fit_pool,
            snapshot.since_fit,
            snapshot.fit_historical_data,
        );
        self.tracker = tracker;
        self.ingested = snapshot.ingested;
        self.feature_width = snapshot.feature_width;
        self.rejected = snapshot.rejected;
        self.fit_count = snapshot.fit_count;
        self.trial_mismatches = snapshot.trial_mismatches;
        Ok(())
    }
}
