//! # Pinebark Python Bindings
//!
//! PyO3 bindings exposing the Pinebark kernel to Python sweep harnesses and
//! notebooks.
//!
//! ## Usage
//!
//! ```python
//! import pinebark
//!
//! pinebark.init_logging("info")
//!
//! forest = pinebark.Forest(population_size=1000, initial_attack_count=5, random_seed=42)
//! forest.run(50.0)
//! print(forest.counts())
//!
//! # Flat [x0, y0, x1, y1, ...] positions and per-tree status codes
//! xy = forest.positions().reshape(-1, 2)
//! status = forest.statuses()
//!
//! # Independent runs in parallel, one JSON config per run
//! summaries = pinebark.run_batch(['{"random_seed": 1}', '{"random_seed": 2}'], 50.0)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use numpy::{PyArray1, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use canopy::Boundary;
use pinebark_core::hash::hash_simulation;
use pinebark_core::sweep;
use pinebark_core::{
    AgentId, ForestConfig, LifeStatus, RunOutcome, SimError, SimulationClock, StateCounts, Tree,
};

fn to_py_err(err: SimError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_boundary(name: &str) -> PyResult<Boundary> {
    match name.to_lowercase().as_str() {
        "clamped" => Ok(Boundary::Clamped),
        "toroidal" | "torus" => Ok(Boundary::Toroidal),
        other => Err(PyValueError::new_err(format!(
            "unknown boundary {other:?}, expected \"clamped\" or \"toroidal\""
        ))),
    }
}

fn outcome_name(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Exhausted => "exhausted",
        RunOutcome::TimeLimit => "time_limit",
        RunOutcome::Condition => "condition",
        RunOutcome::Stopped => "stopped",
    }
}

/// Tree life status for Python.
#[pyclass(name = "LifeStatus", eq, eq_int, hash, frozen)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[allow(non_camel_case_types)] // Python convention uses SCREAMING_SNAKE_CASE for enums
pub enum PyLifeStatus {
    /// No beetles
    HEALTHY = 0,
    /// Under attack
    ATTACKED = 1,
    /// Killed
    DEAD = 2,
}

impl From<LifeStatus> for PyLifeStatus {
    fn from(status: LifeStatus) -> Self {
        match status {
            LifeStatus::Healthy => Self::HEALTHY,
            LifeStatus::Attacked => Self::ATTACKED,
            LifeStatus::Dead => Self::DEAD,
        }
    }
}

/// Per-status tree counts.
#[pyclass(name = "StateCounts", frozen)]
#[derive(Clone, Copy)]
pub struct PyStateCounts {
    #[pyo3(get)]
    healthy: usize,
    #[pyo3(get)]
    attacked: usize,
    #[pyo3(get)]
    dead: usize,
}

impl From<StateCounts> for PyStateCounts {
    fn from(c: StateCounts) -> Self {
        Self {
            healthy: c.healthy,
            attacked: c.attacked,
            dead: c.dead,
        }
    }
}

#[pymethods]
impl PyStateCounts {
    /// Total number of trees.
    #[getter]
    fn total(&self) -> usize {
        self.healthy + self.attacked + self.dead
    }

    fn __repr__(&self) -> String {
        format!(
            "StateCounts(healthy={}, attacked={}, dead={})",
            self.healthy, self.attacked, self.dead
        )
    }
}

/// Snapshot of one tree.
#[pyclass(name = "Tree", frozen)]
pub struct PyTree {
    #[pyo3(get)]
    id: u64,
    #[pyo3(get)]
    x: f64,
    #[pyo3(get)]
    y: f64,
    #[pyo3(get)]
    diameter: f64,
    #[pyo3(get)]
    resistance: f64,
    #[pyo3(get)]
    infestation: u32,
    #[pyo3(get)]
    status: PyLifeStatus,
}

impl From<&Tree> for PyTree {
    fn from(tree: &Tree) -> Self {
        let state = tree.state();
        Self {
            id: tree.id().as_u64(),
            x: tree.position().x,
            y: tree.position().y,
            diameter: state.diameter,
            resistance: state.resistance,
            infestation: state.infestation,
            status: state.status.into(),
        }
    }
}

#[pymethods]
impl PyTree {
    /// Position as an `(x, y)` tuple.
    #[getter]
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn __repr__(&self) -> String {
        format!(
            "Tree(id={}, pos=({:.2}, {:.2}), status={:?}, resistance={:.3})",
            self.id, self.x, self.y, self.status, self.resistance
        )
    }
}

/// One simulation run.
///
/// The clock sits behind a mutex so the object can be shared between
/// Python threads; the GIL is released while ticks run.
#[pyclass(name = "Forest")]
pub struct PyForest {
    clock: Mutex<SimulationClock>,
    config: ForestConfig,
}

impl PyForest {
    fn build(config: ForestConfig) -> PyResult<Self> {
        let clock = SimulationClock::new(&config).map_err(to_py_err)?;
        Ok(Self {
            clock: Mutex::new(clock),
            config,
        })
    }

    fn clock(&self) -> MutexGuard<'_, SimulationClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[pymethods]
impl PyForest {
    /// Create a run from keyword arguments.
    #[new]
    #[pyo3(signature = (
        field_width=200.0,
        field_height=200.0,
        population_size=1000,
        max_diameter=100.0,
        max_resistance=1.0,
        initial_attack_count=5,
        random_seed=0,
        neighbor_radius=10.0,
        infestation_threshold=0,
        boundary="toroidal",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        field_width: f64,
        field_height: f64,
        population_size: usize,
        max_diameter: f64,
        max_resistance: f64,
        initial_attack_count: usize,
        random_seed: u64,
        neighbor_radius: f64,
        infestation_threshold: u32,
        boundary: &str,
    ) -> PyResult<Self> {
        Self::build(ForestConfig {
            field_width,
            field_height,
            population_size,
            max_diameter,
            max_resistance,
            initial_attack_count,
            random_seed,
            neighbor_radius,
            infestation_threshold,
            boundary: parse_boundary(boundary)?,
            ..ForestConfig::default()
        })
    }

    /// Create a run from a JSON configuration; missing keys take defaults.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config: ForestConfig =
            serde_json::from_str(json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Self::build(config)
    }

    /// The configuration as a JSON document.
    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.config).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Number of ticks completed.
    #[getter]
    fn tick(&self) -> u64 {
        self.clock().ticks()
    }

    /// Current simulation time.
    #[getter]
    fn time(&self) -> f64 {
        self.clock().now()
    }

    /// Run one tick. Returns the counts after it, or `None` when no events
    /// remain.
    fn step(&self, py: Python<'_>) -> PyResult<Option<PyStateCounts>> {
        let report = py
            .allow_threads(|| self.clock().step_once())
            .map_err(to_py_err)?;
        Ok(report.map(|r| r.counts.into()))
    }

    /// Run until `max_time` or until no events remain.
    ///
    /// Returns why the run stopped: `"time_limit"` or `"exhausted"`.
    ///
    /// Releases the GIL during computation.
    fn run(&self, py: Python<'_>, max_time: f64) -> PyResult<&'static str> {
        let outcome = py
            .allow_threads(|| self.clock().run(max_time))
            .map_err(to_py_err)?;
        Ok(outcome_name(outcome))
    }

    /// Current per-status counts.
    fn counts(&self) -> PyStateCounts {
        self.clock().counts().into()
    }

    /// Flat `[x0, y0, x1, y1, ...]` positions of every tree in id order.
    fn positions<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        let clock = self.clock();
        let flat: Vec<f64> = clock
            .forest()
            .trees()
            .flat_map(|t| [t.position().x, t.position().y])
            .collect();
        flat.to_pyarray(py)
    }

    /// Status code of every tree in id order (0 healthy, 1 attacked, 2 dead).
    fn statuses<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<u8>> {
        let clock = self.clock();
        let codes: Vec<u8> = clock
            .forest()
            .trees()
            .map(|t| PyLifeStatus::from(t.status()) as u8)
            .collect();
        codes.to_pyarray(py)
    }

    /// Snapshot of one tree, or `None` for an unknown id.
    fn tree(&self, id: u64) -> Option<PyTree> {
        self.clock().forest().tree(AgentId::new(id)).map(PyTree::from)
    }

    /// Deterministic hash of the run's state.
    fn state_hash(&self) -> u64 {
        hash_simulation(&self.clock())
    }

    fn __len__(&self) -> usize {
        self.clock().forest().len()
    }

    fn __repr__(&self) -> String {
        let clock = self.clock();
        let counts = clock.counts();
        format!(
            "Forest(tick={}, healthy={}, attacked={}, dead={})",
            clock.ticks(),
            counts.healthy,
            counts.attacked,
            counts.dead
        )
    }
}

/// Run many JSON configurations in parallel.
///
/// Returns one JSON summary per configuration, in input order. Raises
/// `ValueError` naming the first configuration that failed.
#[pyfunction]
fn run_batch(py: Python<'_>, configs: Vec<String>, max_time: f64) -> PyResult<Vec<String>> {
    let configs = configs
        .iter()
        .enumerate()
        .map(|(i, json)| {
            serde_json::from_str::<ForestConfig>(json)
                .map_err(|e| PyValueError::new_err(format!("config {i}: {e}")))
        })
        .collect::<PyResult<Vec<_>>>()?;

    let results = py.allow_threads(|| sweep::run_batch(&configs, max_time));
    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            let summary =
                result.map_err(|e| PyValueError::new_err(format!("config {i}: {e}")))?;
            serde_json::to_string(&summary).map_err(|e| PyValueError::new_err(e.to_string()))
        })
        .collect()
}

/// Install a `tracing` subscriber printing to stderr.
///
/// Returns `False` if a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> PyResult<bool> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| PyValueError::new_err(format!("unknown log level {level:?}")))?;
    Ok(tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok())
}

/// Python module definition.
#[pymodule]
fn _pinebark(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyForest>()?;
    m.add_class::<PyTree>()?;
    m.add_class::<PyStateCounts>()?;
    m.add_class::<PyLifeStatus>()?;
    m.add_function(wrap_pyfunction!(run_batch, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
