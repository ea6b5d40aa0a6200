//! The simulation clock: drives the scheduler tick by tick.
//!
//! `SimulationClock` owns the forest and the scheduler. One tick fires
//! every event due at the next scheduled time; after each tick the
//! registered observers receive a [`TickReport`]. No model logic lives
//! here.
//!
//! # Example
//!
//! ```
//! use pinebark_core::{ForestConfig, RunOutcome, SimulationClock};
//!
//! let config = ForestConfig::default().with_population(200, 3).with_seed(42);
//! let mut clock = SimulationClock::new(&config).unwrap();
//!
//! let outcome = clock.run(10.0).unwrap();
//! assert_eq!(outcome, RunOutcome::TimeLimit);
//! assert_eq!(clock.ticks(), 10);
//! assert_eq!(clock.counts().total(), 200);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ForestConfig;
use crate::error::{Result, SimError};
use crate::forest::Forest;
use crate::observer::{StateCounts, TickObserver, TickReport};
use crate::population::{self, Population};
use crate::scheduler::Scheduler;
use crate::tree::InfestationPolicy;

/// Why a run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No live events remain
    Exhausted,
    /// The next event lies beyond the time limit
    TimeLimit,
    /// The run condition was met
    Condition,
    /// The stop handle was triggered
    Stopped,
}

/// Cooperative stop request for a running clock.
///
/// The flag is checked between ticks; a run that sees it returns
/// [`RunOutcome::Stopped`] and clears it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the clock to stop before its next tick.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true while a stop request is pending.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Single owner of a run's forest and scheduler.
pub struct SimulationClock {
    forest: Forest,
    scheduler: Scheduler<Forest>,
    observers: Vec<Box<dyn TickObserver>>,
    ticks: u64,
    stop: StopHandle,
}

impl fmt::Debug for SimulationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationClock")
            .field("forest", &self.forest)
            .field("scheduler", &self.scheduler)
            .field("observers", &format!("[{} observers]", self.observers.len()))
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl SimulationClock {
    /// Build a fresh, independent run from a configuration.
    ///
    /// The random stream is a `ChaCha8Rng` seeded from `random_seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for an invalid configuration.
    pub fn new(config: &ForestConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Ok(Self::from_population(population::build(config, rng)?))
    }

    /// Like [`new`](Self::new), with a custom infestation policy.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for an invalid configuration.
    pub fn with_policy(config: &ForestConfig, policy: Arc<dyn InfestationPolicy>) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        Ok(Self::from_population(population::build_with_policy(
            config, rng, policy,
        )?))
    }

    /// Wrap an already built population.
    #[must_use]
    pub fn from_population(population: Population) -> Self {
        Self {
            forest: population.forest,
            scheduler: population.scheduler,
            observers: Vec::new(),
            ticks: 0,
            stop: StopHandle::default(),
        }
    }

    /// Register an observer notified after every tick.
    pub fn add_observer(&mut self, observer: impl TickObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Handle that stops a run from another thread or from an observer.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Fire every event at the next scheduled time.
    ///
    /// Returns `None` when no live events remain.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by a step callback.
    pub fn step_once(&mut self) -> Result<Option<TickReport>> {
        let Some(time) = self.scheduler.next_time() else {
            return Ok(None);
        };
        let fired = self.scheduler.advance_to(time, &mut self.forest)?;
        self.ticks += 1;

        let report = TickReport {
            tick: self.ticks,
            time,
            counts: self.forest.counts(),
        };
        debug!(
            tick = report.tick,
            time,
            fired,
            healthy = report.counts.healthy,
            attacked = report.counts.attacked,
            dead = report.counts.dead,
            "tick complete"
        );
        for observer in &mut self.observers {
            observer.on_tick(&self.forest, &report);
        }
        Ok(Some(report))
    }

    /// Run ticks until no events remain, the next event lies beyond
    /// `max_time`, or the stop handle is triggered.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTime`] for a NaN or past `max_time`, and
    /// propagates the first error raised by a step callback.
    pub fn run(&mut self, max_time: f64) -> Result<RunOutcome> {
        if max_time.is_nan() || max_time < self.scheduler.now() {
            return Err(SimError::InvalidTime {
                requested: max_time,
                now: self.scheduler.now(),
                reason: "run limit is before the current time",
            });
        }
        self.drive(max_time, |_, _| false)
    }

    /// Run ticks until `condition` holds after a tick, no events remain, or
    /// the stop handle is triggered.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by a step callback.
    pub fn run_until<F>(&mut self, condition: F) -> Result<RunOutcome>
    where
        F: FnMut(&Forest, &TickReport) -> bool,
    {
        self.drive(f64::INFINITY, condition)
    }

    fn drive<F>(&mut self, max_time: f64, mut condition: F) -> Result<RunOutcome>
    where
        F: FnMut(&Forest, &TickReport) -> bool,
    {
        let outcome = loop {
            if self.stop.take() {
                break RunOutcome::Stopped;
            }
            match self.scheduler.next_time() {
                None => break RunOutcome::Exhausted,
                Some(time) if time > max_time => break RunOutcome::TimeLimit,
                Some(_) => {}
            }
            let Some(report) = self.step_once()? else {
                break RunOutcome::Exhausted;
            };
            if condition(&self.forest, &report) {
                break RunOutcome::Condition;
            }
        };
        let counts = self.forest.counts();
        info!(
            ?outcome,
            ticks = self.ticks,
            time = self.scheduler.now(),
            healthy = counts.healthy,
            attacked = counts.attacked,
            dead = counts.dead,
            "run finished"
        );
        Ok(outcome)
    }

    /// The forest, valid for inspection between ticks.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<Forest> {
        &self.scheduler
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Number of ticks completed.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Per-status tree counts.
    #[must_use]
    pub fn counts(&self) -> StateCounts {
        self.forest.counts()
    }
}
