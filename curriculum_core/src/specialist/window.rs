//! Rolling batch window of one specialist.
//!
//! Conditions enter as *pending* (not yet scored). A scoring pass removes the
//! oldest whole multiple of the score batch size from the pending queue; once
//! scored, those samples move into the *fit pool*. Fitting therefore only ever
//! sees data that has already been scored, so the batch scored in a generation
//! is never part of the fit performed in that same generation.

use std::collections::VecDeque;

use crate::condition::Condition;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWindow {
    pending: VecDeque<Condition>,
    fit_pool: Vec<Condition>,
    since_fit: usize,
    historical: bool,
}

impl BatchWindow {
    pub fn new(historical: bool) -> Self {
        Self {
            historical,
            ..Self::default()
        }
    }

    pub(crate) fn from_parts(
        pending: Vec<Condition>,
        fit_pool: Vec<Condition>,
        since_fit: usize,
        historical: bool,
    ) -> Self {
        Self {
            pending: pending.into(),
            fit_pool,
            since_fit,
            historical,
        }
    }

    pub fn push(&mut self, conditions: &[Condition]) {
        self.pending.extend(conditions.iter().cloned());
    }

    /// Unscored samples, oldest first.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Condition> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Samples retained for fitting.
    pub fn fit_pool(&self) -> &[Condition] {
        &self.fit_pool
    }

    /// Samples added to the fit pool since the last fit.
    pub fn since_fit(&self) -> usize {
        self.since_fit
    }

    pub fn is_historical(&self) -> bool {
        self.historical
    }

    /// Remove the oldest `k * batch_size` pending samples for the largest
    /// possible `k`. Returns an empty batch when fewer than `batch_size` are
    /// pending.
    pub fn take_score_batch(&mut self, batch_size: usize) -> Vec<Condition> {
        if batch_size == 0 {
            return Vec::new();
        }
        let take = (self.pending.len() / batch_size) * batch_size;
        self.pending.drain(..take).collect()
    }

    /// Whether enough scored data accumulated to refit.
    pub fn fit_ready(&self, batch_size: usize) -> bool {
        if self.historical {
            self.since_fit >= batch_size && !self.fit_pool.is_empty()
        } else {
            self.fit_pool.len() >= batch_size
        }
    }

    /// Close a fit round, whether the fit succeeded or not. Non-historical
    /// windows drop the pool they offered; historical windows keep everything
    /// and wait for another fit batch of new samples.
    pub fn finish_fit(&mut self) {
        if !self.historical {
            self.fit_pool.clear();
        }
        self.since_fit = 0;
    }

    /// Move a scored batch into the fit pool.
    pub fn retire(&mut self, batch: Vec<Condition>) {
        self.since_fit += batch.len();
        self.fit_pool.extend(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(n: usize) -> Vec<Condition> {
        (0..n)
            .map(|i| Condition::from_parts(&[i as f64], (i % 2) as f64))
            .collect()
    }

    #[test]
    fn score_batch_takes_whole_multiples_oldest_first() {
        let mut window = BatchWindow::new(false);
        window.push(&conditions(50));
        let batch = window.take_score_batch(20);
        assert_eq!(batch.len(), 40);
        assert_eq!(batch[0].features(), &[0.0]);
        assert_eq!(window.pending_len(), 10);
        assert_eq!(window.pending().next().unwrap().features(), &[40.0]);
    }

    #[test]
    fn short_window_yields_empty_batch() {
        let mut window = BatchWindow::new(false);
        window.push(&conditions(5));
        assert!(window.take_score_batch(20).is_empty());
        assert_eq!(window.pending_len(), 5);
    }

    #[test]
    fn non_historical_fit_consumes_pool() {
        let mut window = BatchWindow::new(false);
        window.retire(conditions(30));
        assert!(!window.fit_ready(50));
        window.retire(conditions(30));
        assert!(window.fit_ready(50));
        window.finish_fit();
        assert!(window.fit_pool().is_empty());
        assert_eq!(window.since_fit(), 0);
    }

    #[test]
    fn historical_fit_keeps_pool() {
        let mut window = BatchWindow::new(true);
        window.retire(conditions(50));
        assert!(window.fit_ready(50));
        window.finish_fit();
        assert_eq!(window.fit_pool().len(), 50);
        assert!(!window.fit_ready(50));
        window.retire(conditions(50));
        assert!(window.fit_ready(50));
        assert_eq!(window.fit_pool().len(), 100);
    }
}
