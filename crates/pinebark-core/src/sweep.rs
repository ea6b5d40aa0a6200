//! Parameter sweeps: many independent runs in parallel.
//!
//! Each configuration gets its own [`SimulationClock`]; instances share
//! nothing, so they run on the rayon pool without synchronization and
//! every summary matches what a sequential run of the same configuration
//! produces.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ForestConfig;
use crate::error::Result;
use crate::hash::hash_simulation;
use crate::observer::{CountRecorder, StateCounts};
use crate::simulation::{RunOutcome, SimulationClock};

/// Result of one run of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Seed of the run
    pub seed: u64,
    /// Counts before the first tick, then after every tick
    pub history: Vec<StateCounts>,
    /// Counts at the end of the run
    pub final_counts: StateCounts,
    /// Why the run returned
    pub outcome: RunOutcome,
    /// State hash at the end of the run
    pub state_hash: u64,
}

/// Build and run one configuration up to `max_time`.
///
/// # Errors
///
/// Returns the configuration or run error of this configuration.
pub fn run_one(config: &ForestConfig, max_time: f64) -> Result<RunSummary> {
    let mut clock = SimulationClock::new(config)?;
    let recorder = CountRecorder::new();
    clock.add_observer(recorder.clone());

    let initial = clock.counts();
    let outcome = clock.run(max_time)?;

    let mut history = vec![initial];
    history.extend(recorder.take());
    Ok(RunSummary {
        seed: config.random_seed,
        history,
        final_counts: clock.counts(),
        outcome,
        state_hash: hash_simulation(&clock),
    })
}

/// Run every configuration in parallel up to `max_time`.
///
/// Results are returned in input order; each entry carries its own error
/// so one bad configuration does not hide the others.
#[must_use]
pub fn run_batch(configs: &[ForestConfig], max_time: f64) -> Vec<Result<RunSummary>> {
    info!(runs = configs.len(), max_time, "starting batch");
    configs
        .par_iter()
        .map(|config| run_one(config, max_time))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn history_starts_before_the_first_tick() {
        let config = ForestConfig::default().with_population(80, 2).with_seed(4);
        let summary = run_one(&config, 5.0).unwrap();
        assert_eq!(summary.history.len(), 6);
        assert_eq!(summary.history[0].attacked, 2);
        assert_eq!(summary.history.last(), Some(&summary.final_counts));
        assert_eq!(summary.outcome, RunOutcome::TimeLimit);
    }

    #[test]
    fn batch_keeps_input_order_and_isolates_errors() {
        let configs = vec![
            ForestConfig::default().with_population(60, 1).with_seed(1),
            ForestConfig::default().with_population(10, 11),
            ForestConfig::default().with_population(60, 1).with_seed(2),
        ];
        let results = run_batch(&configs, 4.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().seed, 1);
        assert!(matches!(results[1], Err(SimError::Configuration(_))));
        assert_eq!(results[2].as_ref().unwrap().seed, 2);
    }
}
