//! Errors returned by field mutations.

use std::fmt;

use thiserror::Error;

/// Errors emitted by [`SpatialField`](crate::SpatialField) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError<K: fmt::Debug> {
    /// A position could not be stored under the field's boundary policy.
    #[error("position ({x}, {y}) is outside the {width}x{height} field")]
    OutOfBounds {
        /// Requested x coordinate
        x: f64,
        /// Requested y coordinate
        y: f64,
        /// Field width
        width: f64,
        /// Field height
        height: f64,
    },

    /// The key is already stored in the field.
    #[error("agent {0:?} is already present in the field")]
    DuplicateAgent(K),

    /// The key is not stored in the field.
    #[error("agent {0:?} is not present in the field")]
    UnknownKey(K),

    /// The field geometry cannot be used.
    #[error("invalid field configuration: {0}")]
    InvalidConfig(&'static str),
}
