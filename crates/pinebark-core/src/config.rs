//! Run configuration.
//!
//! [`ForestConfig`] is the single object a parameter-sweep harness hands to
//! the kernel. Every field has a default, so partial JSON documents
//! deserialize cleanly.

use canopy::{Boundary, FieldConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::tree::{NeighborPressureConfig, StepRules};

/// Parameters of one simulation run. Read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Width of the forest plot
    pub field_width: f64,
    /// Height of the forest plot
    pub field_height: f64,
    /// Number of trees planted
    pub population_size: usize,
    /// Upper bound of the uniform diameter draw
    pub max_diameter: f64,
    /// Upper bound of the uniform resistance draw, and of resistance itself
    pub max_resistance: f64,
    /// Trees attacked before the first tick
    pub initial_attack_count: usize,
    /// Seed of the run's random stream
    pub random_seed: u64,
    /// Radius within which attacked trees exert pressure
    pub neighbor_radius: f64,
    /// Pressure a healthy tree tolerates without risk of attack
    pub infestation_threshold: u32,
    /// Edge behaviour of the plot
    pub boundary: Boundary,
    /// Grid bucket size; defaults to the neighbor radius
    pub cell_size: Option<f64>,
    /// Time between two steps of the same tree
    pub step_interval: f64,
    /// Parameters of the default infestation policy
    pub policy: NeighborPressureConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            field_width: 200.0,
            field_height: 200.0,
            population_size: 1000,
            max_diameter: 100.0,
            max_resistance: 1.0,
            initial_attack_count: 5,
            random_seed: 0,
            neighbor_radius: 10.0,
            infestation_threshold: 0,
            boundary: Boundary::Toroidal,
            cell_size: None,
            step_interval: 1.0,
            policy: NeighborPressureConfig::default(),
        }
    }
}

impl ForestConfig {
    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set the plot dimensions.
    #[must_use]
    pub fn with_field(mut self, width: f64, height: f64) -> Self {
        self.field_width = width;
        self.field_height = height;
        self
    }

    /// Set the population size and the number of initially attacked trees.
    #[must_use]
    pub fn with_population(mut self, size: usize, initially_attacked: usize) -> Self {
        self.population_size = size;
        self.initial_attack_count = initially_attacked;
        self
    }

    /// Set the boundary policy.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Set the neighbor radius and the pressure threshold.
    #[must_use]
    pub fn with_spread(mut self, neighbor_radius: f64, infestation_threshold: u32) -> Self {
        self.neighbor_radius = neighbor_radius;
        self.infestation_threshold = infestation_threshold;
        self
    }

    /// Check that the parameters describe a possible run.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<()> {
        if !(positive(self.field_width) && positive(self.field_height)) {
            return Err(SimError::config(
                "field dimensions must be finite and positive",
            ));
        }
        if self.initial_attack_count > self.population_size {
            return Err(SimError::config(format!(
                "initial_attack_count ({}) exceeds population_size ({})",
                self.initial_attack_count, self.population_size
            )));
        }
        if !(positive(self.max_diameter) && self.max_diameter.is_normal()) {
            return Err(SimError::config("max_diameter must be a normal positive number"));
        }
        if !positive(self.max_resistance) {
            return Err(SimError::config("max_resistance must be finite and positive"));
        }
        if !(self.neighbor_radius.is_finite() && self.neighbor_radius >= 0.0) {
            return Err(SimError::config(
                "neighbor_radius must be finite and non-negative",
            ));
        }
        if let Some(cell) = self.cell_size {
            if !positive(cell) {
                return Err(SimError::config("cell_size must be finite and positive"));
            }
        }
        if !positive(self.step_interval) {
            return Err(SimError::config("step_interval must be finite and positive"));
        }
        self.policy.validate()
    }

    /// Geometry of the spatial field for this run.
    #[must_use]
    pub fn field_config(&self) -> FieldConfig {
        let cell_size = self.cell_size.unwrap_or(if self.neighbor_radius > 0.0 {
            self.neighbor_radius
        } else {
            FieldConfig::default().cell_size
        });
        FieldConfig {
            width: self.field_width,
            height: self.field_height,
            boundary: self.boundary,
            cell_size,
        }
    }

    /// Constants handed to every tree step.
    #[must_use]
    pub fn step_rules(&self) -> StepRules {
        StepRules {
            max_resistance: self.max_resistance,
            infestation_threshold: self.infestation_threshold,
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
