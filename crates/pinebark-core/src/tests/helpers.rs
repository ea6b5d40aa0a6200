//! Test helper functions for setting up forests and runs.

use std::sync::Arc;

use glam::DVec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::ForestConfig;
use crate::forest::Forest;
use crate::observer::{CountRecorder, StateCounts};
use crate::simulation::SimulationClock;
use crate::tree::{AgentId, LifeStatus, NeighborPressure, TreeState};

// =============================================================================
// Configurations
// =============================================================================

/// The reference scenario: 200x200 plot, 1000 trees, 5 initially attacked.
pub fn reference_config(seed: u64) -> ForestConfig {
    ForestConfig::default().with_seed(seed)
}

/// A small forest that runs quickly.
pub fn small_config(seed: u64) -> ForestConfig {
    ForestConfig::default()
        .with_field(60.0, 60.0)
        .with_population(120, 3)
        .with_seed(seed)
}

// =============================================================================
// Runs
// =============================================================================

/// Runs `config` for `ticks` ticks and returns the counts after each one.
///
/// # Panics
///
/// Panics if the configuration is invalid or a tick fails.
pub fn run_counts(config: &ForestConfig, ticks: u32) -> Vec<StateCounts> {
    let mut clock = SimulationClock::new(config).unwrap();
    let recorder = CountRecorder::new();
    clock.add_observer(recorder.clone());
    clock.run(f64::from(ticks)).unwrap();
    recorder.take()
}

/// Status of every tree in id order.
pub fn statuses(forest: &Forest) -> Vec<(AgentId, LifeStatus)> {
    forest.trees().map(|t| (t.id(), t.status())).collect()
}

// =============================================================================
// Hand-built forests
// =============================================================================

/// An empty forest with the default policy on a `size` x `size` torus.
pub fn empty_forest(size: f64) -> Forest {
    let config = ForestConfig::default().with_field(size, size);
    Forest::new(
        &config,
        Arc::new(NeighborPressure::default()),
        ChaCha8Rng::seed_from_u64(0),
    )
    .unwrap()
}

/// Plants a healthy tree with the given resistance.
pub fn plant_healthy(forest: &mut Forest, x: f64, y: f64, resistance: f64) -> AgentId {
    forest
        .plant(DVec2::new(x, y), TreeState::healthy(25.0, resistance))
        .unwrap()
}
