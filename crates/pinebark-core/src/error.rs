//! Error types for the simulation kernel.

use canopy::FieldError;
use thiserror::Error;

use crate::tree::AgentId;

/// Errors returned by scheduler, forest, population and clock operations.
///
/// Every variant is recoverable by the caller. A `Configuration` error from
/// population building means the run never started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A time or interval was rejected by the scheduler.
    #[error("invalid time {requested}: {reason} (scheduler time is {now})")]
    InvalidTime {
        /// The rejected time or interval
        requested: f64,
        /// Scheduler time when the request was made
        now: f64,
        /// Why it was rejected
        reason: &'static str,
    },

    /// An impossible parameter combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A spatial field operation failed (out of bounds, duplicate agent, ...).
    #[error(transparent)]
    Field(#[from] FieldError<AgentId>),

    /// No tree with this id exists in the forest.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
}

impl SimError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true for errors caused by a position outside a clamped field.
    #[must_use]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::Field(FieldError::OutOfBounds { .. }))
    }

    /// Returns true for errors caused by inserting an id twice.
    #[must_use]
    pub fn is_duplicate_agent(&self) -> bool {
        matches!(self, Self::Field(FieldError::DuplicateAgent(_)))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SimError>;
