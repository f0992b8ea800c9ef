//! Confusion-matrix bookkeeping for specialist scoring passes.
//!
//! Each generation a specialist scores one frozen batch twice: once with the
//! model as it stood before the generation's fit (prefit) and once after
//! (postfit). Both tallies are stored side by side in a [`ConfusionOutcome`]
//! and appended to the specialist's [`ConfusionTracker`].

use serde::{Deserialize, Serialize};

use crate::error::SpecialistError;

/// Binary classification tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: u64,
    pub fp: u64,
    pub fn_: u64,
    pub tn: u64,
}

impl ConfusionCounts {
    /// Tally predictions against ground-truth labels.
    ///
    /// Both slices must have the same length; extra entries on either side are
    /// ignored.
    pub fn from_labels(predicted: &[bool], truth: &[bool]) -> Self {
        let mut counts = Self::default();
        for (&p, &t) in predicted.iter().zip(truth) {
            counts.tally(p, t);
        }
        counts
    }

    pub fn tally(&mut self, predicted: bool, truth: bool) {
        match (predicted, truth) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, true) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    fn merge(&mut self, other: &ConfusionCounts) {
        self.tp += other.tp;
        self.fp += other.fp;
        self.fn_ += other.fn_;
        self.tn += other.tn;
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Prefit/postfit tallies of one specialist for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OutcomeColumns", into = "OutcomeColumns")]
pub struct ConfusionOutcome {
    pub generation: u64,
    pub prefit: ConfusionCounts,
    pub postfit: ConfusionCounts,
}

impl ConfusionOutcome {
    /// Outcome for a generation in which nothing was scored.
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            prefit: ConfusionCounts::default(),
            postfit: ConfusionCounts::default(),
        }
    }

    /// Number of samples in the scored batch.
    pub fn batch_size(&self) -> u64 {
        self.prefit.total()
    }

    /// Whether the refit changed any prediction on the scored batch.
    pub fn model_changed(&self) -> bool {
        self.prefit != self.postfit
    }
}

/// Flat column layout used on disk and in the metrics stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct OutcomeColumns {
    gen: u64,
    prefit_tp: u64,
    prefit_fp: u64,
    prefit_fn: u64,
    prefit_tn: u64,
    postfit_tp: u64,
    postfit_fp: u64,
    postfit_fn: u64,
    postfit_tn: u64,
}

impl From<OutcomeColumns> for ConfusionOutcome {
    fn from(c: OutcomeColumns) -> Self {
        Self {
            generation: c.gen,
            prefit: ConfusionCounts {
                tp: c.prefit_tp,
                fp: c.prefit_fp,
                fn_: c.prefit_fn,
                tn: c.prefit_tn,
            },
            postfit: ConfusionCounts {
                tp: c.postfit_tp,
                fp: c.postfit_fp,
                fn_: c.postfit_fn,
                tn: c.postfit_tn,
            },
        }
    }
}

impl From<ConfusionOutcome> for OutcomeColumns {
    fn from(o: ConfusionOutcome) -> Self {
        Self {
            gen: o.generation,
            prefit_tp: o.prefit.tp,
            prefit_fp: o.prefit.fp,
            prefit_fn: o.prefit.fn_,
            prefit_tn: o.prefit.tn,
            postfit_tp: o.postfit.tp,
            postfit_fp: o.postfit.fp,
            postfit_fn: o.postfit.fn_,
            postfit_tn: o.postfit.tn,
        }
    }
}

/// Row of the lightweight metrics stream, keyed by specialist and generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionRow {
    pub specialist: String,
    #[serde(flatten)]
    pub outcome: ConfusionOutcome,
}

/// Aggregate view over a tracker's history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerSummary {
    pub generations: usize,
    pub prefit: ConfusionCounts,
    pub postfit: ConfusionCounts,
    /// Generations whose refit changed at least one prediction.
    pub changed_generations: usize,
}

impl TrackerSummary {
    /// Postfit minus prefit accuracy over all scored samples.
    pub fn accuracy_gain(&self) -> f64 {
        self.postfit.accuracy() - self.prefit.accuracy()
    }
}

/// Append-only, generation-ordered history of confusion outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfusionTracker {
    rows: Vec<ConfusionOutcome>,
    streamed: usize,
}

impl ConfusionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tracker from persisted rows. Restored rows count as already
    /// streamed.
    pub fn from_rows(rows: Vec<ConfusionOutcome>) -> Result<Self, SpecialistError> {
        let mut tracker = Self::new();
        for row in rows {
            tracker.record(row)?;
        }
        tracker.streamed = tracker.rows.len();
        Ok(tracker)
    }

    /// Append an outcome. Generations must be strictly increasing.
    pub fn record(&mut self, outcome: ConfusionOutcome) -> Result<(), SpecialistError> {
        if let Some(last) = self.rows.last() {
            if outcome.generation <= last.generation {
                return Err(SpecialistError::out_of_order(
                    last.generation,
                    outcome.generation,
                ));
            }
        }
        self.rows.push(outcome);
        Ok(())
    }

    pub fn rows(&self) -> &[ConfusionOutcome] {
        &self.rows
    }

    pub fn last(&self) -> Option<&ConfusionOutcome> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows not yet handed to the metrics stream.
    pub fn unstreamed(&self) -> &[ConfusionOutcome] {
        &self.rows[self.streamed..]
    }

    /// Mark every current row as streamed.
    pub fn mark_streamed(&mut self) {
        self.streamed = self.rows.len();
    }

    pub fn summary(&self) -> TrackerSummary {
        let mut summary = TrackerSummary {
            generations: self.rows.len(),
            ..TrackerSummary::default()
        };
        for row in &self.rows {
            summary.prefit.merge(&row.prefit);
            summary.postfit.merge(&row.postfit);
            if row.model_changed() {
                summary.changed_generations += 1;
            }
        }
        summary
    }
}
