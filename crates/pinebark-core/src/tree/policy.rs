//! Infestation policy: how beetle pressure spreads attacks and kills trees.
//!
//! A tick of a tree is a pure function of its own state, the pressure from
//! its neighbors (the number of attacked trees within the neighbor radius)
//! and one uniform random draw in `[0, 1)`. The probability and damage
//! functions are pluggable through [`InfestationPolicy`];
//! [`NeighborPressure`] is the default.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LifeStatus, TreeState};
use crate::error::{Result, SimError};

/// Per-run constants a tree step needs besides the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRules {
    /// Upper bound of resistance
    pub max_resistance: f64,
    /// A healthy tree can be attacked only when pressure exceeds this
    pub infestation_threshold: u32,
}

/// Probability and damage functions driving tree transitions.
pub trait InfestationPolicy: fmt::Debug + Send + Sync {
    /// Probability in `[0, 1]` that a healthy tree becomes attacked this
    /// tick, given that pressure already exceeds the threshold.
    fn attack_probability(&self, state: &TreeState, pressure: u32, max_resistance: f64) -> f64;

    /// Beetles added to an attacked tree this tick.
    fn infestation_gain(&self, state: &TreeState, pressure: u32) -> u32;

    /// Resistance an attacked tree loses this tick.
    fn resistance_loss(&self, state: &TreeState, pressure: u32, max_resistance: f64) -> f64;

    /// Resistance below which an attacked tree with this infestation dies.
    fn lethal_resistance(&self, state: &TreeState, max_resistance: f64) -> f64;
}

/// Parameters of the [`NeighborPressure`] policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborPressureConfig {
    /// Scale of the attack probability `rate * (1 - resistance / max)`
    pub attack_rate: f64,
    /// Fraction of max resistance lost every attacked tick
    pub base_loss: f64,
    /// Extra fraction of max resistance lost per attacked neighbor
    pub per_neighbor_loss: f64,
    /// Infestation at which any remaining resistance is overwhelmed
    pub lethal_infestation: u32,
}

impl Default for NeighborPressureConfig {
    fn default() -> Self {
        Self {
            attack_rate: 1.0,
            base_loss: 0.05,
            per_neighbor_loss: 0.02,
            lethal_infestation: 100,
        }
    }
}

impl NeighborPressureConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for negative or non-finite rates,
    /// a zero base loss (attacked trees would never die) or a zero lethal
    /// infestation.
    pub fn validate(&self) -> Result<()> {
        if !(self.attack_rate.is_finite() && self.attack_rate >= 0.0) {
            return Err(SimError::config("attack_rate must be finite and non-negative"));
        }
        if !(self.base_loss.is_finite() && self.base_loss > 0.0) {
            return Err(SimError::config("base_loss must be finite and positive"));
        }
        if !(self.per_neighbor_loss.is_finite() && self.per_neighbor_loss >= 0.0) {
            return Err(SimError::config(
                "per_neighbor_loss must be finite and non-negative",
            ));
        }
        if self.lethal_infestation == 0 {
            return Err(SimError::config("lethal_infestation must be positive"));
        }
        Ok(())
    }
}

/// Default policy: attack and damage scale with the count of attacked
/// neighbors.
///
/// - attack probability: `attack_rate * (1 - resistance / max)`, clamped to `[0, 1]`
/// - infestation gain: `1 + pressure`
/// - resistance loss: `max * (base_loss + per_neighbor_loss * pressure)`
/// - lethal resistance: `max * infestation / lethal_infestation`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeighborPressure {
    config: NeighborPressureConfig,
}

impl NeighborPressure {
    /// Create the policy from its parameters.
    #[must_use]
    pub const fn new(config: NeighborPressureConfig) -> Self {
        Self { config }
    }

    /// The policy parameters.
    #[must_use]
    pub const fn config(&self) -> &NeighborPressureConfig {
        &self.config
    }
}

impl InfestationPolicy for NeighborPressure {
    fn attack_probability(&self, state: &TreeState, _pressure: u32, max_resistance: f64) -> f64 {
        let vulnerability = 1.0 - state.resistance / max_resistance;
        (self.config.attack_rate * vulnerability).clamp(0.0, 1.0)
    }

    fn infestation_gain(&self, _state: &TreeState, pressure: u32) -> u32 {
        pressure.saturating_add(1)
    }

    fn resistance_loss(&self, _state: &TreeState, pressure: u32, max_resistance: f64) -> f64 {
        max_resistance
            * (self.config.base_loss + self.config.per_neighbor_loss * f64::from(pressure))
    }

    fn lethal_resistance(&self, state: &TreeState, max_resistance: f64) -> f64 {
        max_resistance * f64::from(state.infestation) / f64::from(self.config.lethal_infestation)
    }
}

/// Compute a tree's next state.
///
/// `pressure` is the number of attacked neighbors within the neighbor
/// radius and `draw` a uniform sample in `[0, 1)`. Dead trees are returned
/// unchanged.
#[must_use]
pub fn next_state(
    state: &TreeState,
    pressure: u32,
    draw: f64,
    rules: &StepRules,
    policy: &dyn InfestationPolicy,
) -> TreeState {
    match state.status {
        LifeStatus::Healthy => {
            if pressure > rules.infestation_threshold
                && draw < policy.attack_probability(state, pressure, rules.max_resistance)
            {
                state.attacked()
            } else {
                *state
            }
        }
        LifeStatus::Attacked => {
            let loss = policy.resistance_loss(state, pressure, rules.max_resistance);
            let next = TreeState {
                infestation: state
                    .infestation
                    .saturating_add(policy.infestation_gain(state, pressure)),
                resistance: (state.resistance - loss).max(0.0),
                ..*state
            };
            if next.resistance <= 0.0
                || next.resistance < policy.lethal_resistance(&next, rules.max_resistance)
            {
                next.dead()
            } else {
                next
            }
        }
        LifeStatus::Dead => *state,
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = TreeState> {
        (
            0.0..100.0_f64,
            0.0..=1.0_f64,
            0_u32..200,
            prop_oneof![
                Just(LifeStatus::Healthy),
                Just(LifeStatus::Attacked),
                Just(LifeStatus::Dead)
            ],
        )
            .prop_map(|(diameter, resistance, infestation, status)| TreeState {
                diameter,
                resistance,
                infestation,
                status,
            })
    }

    proptest! {
        #[test]
        fn transitions_only_move_forward(
            state in any_state(),
            pressure in 0_u32..50,
            draw in 0.0..1.0_f64,
            threshold in 0_u32..5,
        ) {
            let rules = StepRules { max_resistance: 1.0, infestation_threshold: threshold };
            let next = next_state(&state, pressure, draw, &rules, &NeighborPressure::default());

            prop_assert!(state.status.can_become(next.status));
            prop_assert!(next.resistance <= state.resistance);
            prop_assert!(next.resistance >= 0.0);
            prop_assert!(next.infestation >= state.infestation);
            prop_assert_eq!(next.diameter, state.diameter);
        }

        #[test]
        fn no_pressure_never_starts_an_attack(
            state in any_state(),
            draw in 0.0..1.0_f64,
        ) {
            prop_assume!(state.status == LifeStatus::Healthy);
            let rules = StepRules { max_resistance: 1.0, infestation_threshold: 0 };
            let next = next_state(&state, 0, draw, &rules, &NeighborPressure::default());
            prop_assert_eq!(next, state);
        }
    }
}
