use std::fmt;
use std::time::Duration;

use super::state::RunState;

/// One console progress line per processed generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressLine {
    pub seed: u64,
    pub percent: f64,
    pub generation: u64,
    pub bestfit: f64,
    pub bestgfit: f64,
    pub bestsam: f64,
    pub avg: f64,
    pub weightsize: f64,
}

impl ProgressLine {
    /// Percent complete is the current generation against the last one the
    /// data source holds.
    pub fn from_state(state: &RunState, end_generation: u64) -> Self {
        let percent = if end_generation == 0 {
            0.0
        } else {
            state.generation as f64 / end_generation as f64 * 100.0
        };
        Self {
            seed: state.seed,
            percent,
            generation: state.generation,
            bestfit: state.best_fitness,
            bestgfit: state.best_post_fitness,
            bestsam: state.best_sample_fitness,
            avg: state.avg_fitness,
            weightsize: state.avg_param_norm,
        }
    }
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seed {} ({:.1}%) gen {} bestfit {:.2} bestgfit {:.2} bestsam {:.2} avg {:.2} weightsize {:.2}",
            self.seed,
            self.percent,
            self.generation,
            self.bestfit,
            self.bestgfit,
            self.bestsam,
            self.avg,
            self.weightsize
        )
    }
}

/// `Simulation time: <m>m<s>s`
pub fn simulation_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("Simulation time: {}m{}s", secs / 60, secs % 60)
}
