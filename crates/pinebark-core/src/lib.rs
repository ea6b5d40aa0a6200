//! # Pinebark Core
//!
//! Discrete-event simulation kernel for bark beetle spread through a
//! stand of trees.
//!
//! Each tree is an agent on a 2D plot with a repeating step event. At every
//! step a tree looks at the attacked trees within a radius, draws one
//! random number and moves forward along `Healthy -> Attacked -> Dead`.
//! Runs are fully reproducible from the configuration's seed.
//!
//! ## Architecture
//!
//! - [`scheduler`]: time-ordered, cancellable one-shot and repeating events
//! - [`forest`]: tree table plus the [`canopy`] spatial index of living trees
//! - [`tree`]: agent state machine and the infestation policy
//! - [`population`]: seeded construction of the initial forest
//! - [`simulation`]: the clock that drives the scheduler and notifies observers
//! - [`sweep`]: independent runs in parallel for parameter sweeps
//!
//! ## Usage
//!
//! ```
//! use pinebark_core::{ForestConfig, SimulationClock};
//!
//! let config = ForestConfig::default().with_seed(42);
//! let mut clock = SimulationClock::new(&config).unwrap();
//! clock.run(5.0).unwrap();
//!
//! let counts = clock.counts();
//! assert_eq!(counts.total(), 1000);
//! println!("{} healthy, {} attacked, {} dead", counts.healthy, counts.attacked, counts.dead);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

// Re-export canopy for spatial types
pub use canopy;

pub mod config;
pub mod error;
pub mod forest;
pub mod hash;
pub mod observer;
pub mod population;
pub mod scheduler;
pub mod simulation;
pub mod sweep;
pub mod tree;

#[cfg(test)]
mod tests;

pub use config::ForestConfig;
pub use error::{Result, SimError};
pub use forest::{Forest, Neighborhood};
pub use observer::{CountRecorder, StateCounts, TickObserver, TickReport};
pub use scheduler::{EventContext, EventHandle, EventId, Scheduler};
pub use simulation::{RunOutcome, SimulationClock, StopHandle};
pub use sweep::{run_batch, RunSummary};
pub use tree::{AgentId, LifeStatus, StatusMask, Tree, TreeState};
