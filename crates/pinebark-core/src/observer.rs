//! Per-tick reporting for statistics and rendering collaborators.
//!
//! After every tick the [`SimulationClock`](crate::simulation::SimulationClock)
//! hands each registered [`TickObserver`] a [`TickReport`] and a read-only
//! view of the forest. Closures implement the trait directly.
//!
//! # Example
//!
//! ```
//! use pinebark_core::observer::CountRecorder;
//! use pinebark_core::{ForestConfig, SimulationClock};
//!
//! let config = ForestConfig::default().with_population(50, 2).with_seed(1);
//! let mut clock = SimulationClock::new(&config).unwrap();
//!
//! let recorder = CountRecorder::new();
//! clock.add_observer(recorder.clone());
//! clock.run(3.0).unwrap();
//!
//! let history = recorder.take();
//! assert_eq!(history.len(), 3);
//! assert!(history.iter().all(|counts| counts.total() == 50));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::forest::Forest;
use crate::tree::LifeStatus;

/// Number of trees in each life status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateCounts {
    /// Healthy trees
    pub healthy: usize,
    /// Attacked trees
    pub attacked: usize,
    /// Dead trees
    pub dead: usize,
}

impl StateCounts {
    /// Total number of trees.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.healthy + self.attacked + self.dead
    }

    /// Count for one status.
    #[must_use]
    pub const fn of(&self, status: LifeStatus) -> usize {
        match status {
            LifeStatus::Healthy => self.healthy,
            LifeStatus::Attacked => self.attacked,
            LifeStatus::Dead => self.dead,
        }
    }

    pub(crate) fn record(&mut self, status: LifeStatus) {
        match status {
            LifeStatus::Healthy => self.healthy += 1,
            LifeStatus::Attacked => self.attacked += 1,
            LifeStatus::Dead => self.dead += 1,
        }
    }
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Number of ticks completed, starting at 1
    pub tick: u64,
    /// Simulation time of the tick
    pub time: f64,
    /// Counts after the tick
    pub counts: StateCounts,
}

/// Receives a report after every tick.
pub trait TickObserver: Send {
    /// Called once per tick, after all events of that tick have fired.
    fn on_tick(&mut self, forest: &Forest, report: &TickReport);
}

impl<F> TickObserver for F
where
    F: FnMut(&Forest, &TickReport) + Send,
{
    fn on_tick(&mut self, forest: &Forest, report: &TickReport) {
        self(forest, report);
    }
}

/// Observer that records the per-tick counts.
///
/// Clones share the same history, so a clone can be registered with the
/// clock while another handle is kept to read the results.
#[derive(Debug, Clone, Default)]
pub struct CountRecorder {
    history: Arc<Mutex<Vec<StateCounts>>>,
}

impl CountRecorder {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the counts recorded so far, one entry per tick.
    #[must_use]
    pub fn history(&self) -> Vec<StateCounts> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded counts.
    #[must_use]
    pub fn take(&self) -> Vec<StateCounts> {
        std::mem::take(
            &mut *self
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl TickObserver for CountRecorder {
    fn on_tick(&mut self, _forest: &Forest, report: &TickReport) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_record_and_total() {
        let mut counts = StateCounts::default();
        counts.record(LifeStatus::Healthy);
        counts.record(LifeStatus::Healthy);
        counts.record(LifeStatus::Dead);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.of(LifeStatus::Healthy), 2);
        assert_eq!(counts.of(LifeStatus::Attacked), 0);
        assert_eq!(counts.of(LifeStatus::Dead), 1);
    }

    #[test]
    fn recorder_clones_share_history() {
        let recorder = CountRecorder::new();
        let clone = recorder.clone();
        clone
            .history
            .lock()
            .unwrap()
            .push(StateCounts {
                healthy: 1,
                ..StateCounts::default()
            });
        assert_eq!(recorder.history().len(), 1);
        assert_eq!(recorder.take().len(), 1);
        assert!(clone.history().is_empty());
    }
}
