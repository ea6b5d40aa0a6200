//! Building the initial forest and its step schedule.
//!
//! Population building is fully determined by the configuration and the
//! random stream it is given. The draws are consumed in a fixed order:
//! for every tree in id order `x`, `y`, diameter and resistance, then the
//! initial attack sample. Diameters come from the open interval
//! `(0, max_diameter)`, so every tree has a positive trunk. The same stream then feeds the tree steps.

use std::sync::Arc;

use glam::DVec2;
use rand::distributions::Open01;
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::ForestConfig;
use crate::error::Result;
use crate::forest::Forest;
use crate::scheduler::{EventContext, Scheduler};
use crate::tree::{AgentId, InfestationPolicy, NeighborPressure, TreeState};

/// A freshly built forest and the scheduler holding every tree's step.
#[derive(Debug)]
pub struct Population {
    /// The planted forest, initial attacks applied
    pub forest: Forest,
    /// One repeating step event per tree
    pub scheduler: Scheduler<Forest>,
}

/// Build the population with the default [`NeighborPressure`] policy.
///
/// # Errors
///
/// Returns [`SimError::Configuration`](crate::SimError::Configuration) for
/// an invalid configuration, before any tree is created or scheduled.
pub fn build(config: &ForestConfig, rng: ChaCha8Rng) -> Result<Population> {
    build_with_policy(config, rng, Arc::new(NeighborPressure::new(config.policy)))
}

/// Build the population with a custom infestation policy.
///
/// Every tree gets a repeating step starting at `step_interval` and firing
/// every `step_interval` after that. Then `initial_attack_count` distinct
/// trees, sampled uniformly without replacement, are forced to the
/// attacked state.
///
/// # Errors
///
/// Returns [`SimError::Configuration`](crate::SimError::Configuration) for
/// an invalid configuration, before any tree is created or scheduled.
pub fn build_with_policy(
    config: &ForestConfig,
    rng: ChaCha8Rng,
    policy: Arc<dyn InfestationPolicy>,
) -> Result<Population> {
    config.validate()?;

    let mut forest = Forest::new(config, policy, rng)?;
    let mut scheduler = Scheduler::new();
    let mut ids = Vec::with_capacity(config.population_size);

    for _ in 0..config.population_size {
        let rng = forest.rng_mut();
        let position = DVec2::new(
            rng.gen_range(0.0..config.field_width),
            rng.gen_range(0.0..config.field_height),
        );
        let diameter = config.max_diameter * rng.sample::<f64, _>(Open01);
        let resistance = rng.gen_range(0.0..config.max_resistance);

        let id = forest.plant(position, TreeState::healthy(diameter, resistance))?;
        let handle = scheduler.schedule_repeating(
            config.step_interval,
            config.step_interval,
            id,
            step_tree,
        )?;
        forest.attach_event(id, handle)?;
        ids.push(id);
    }

    let mut attacked: Vec<AgentId> =
        index::sample(forest.rng_mut(), ids.len(), config.initial_attack_count)
            .into_iter()
            .map(|i| ids[i])
            .collect();
    attacked.sort_unstable();
    for &id in &attacked {
        forest.attack(id)?;
    }

    info!(
        trees = forest.len(),
        attacked = attacked.len(),
        seed = config.random_seed,
        "population built"
    );
    Ok(Population { forest, scheduler })
}

/// Step callback shared by every tree.
fn step_tree(forest: &mut Forest, ctx: &mut EventContext<'_, Forest>) -> Result<()> {
    let status = forest.step_tree(ctx.agent())?;
    if !status.is_alive() {
        ctx.cancel_self();
    }
    Ok(())
}
