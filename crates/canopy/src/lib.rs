//! # Canopy
//!
//! Continuous 2-D spatial field for agent placement and neighbor queries.
//!
//! Canopy stores keyed point positions in a rectangular plane and answers
//! proximity queries through a uniform bucket grid that is updated on every
//! mutation. This enables:
//!
//! - **Consistent queries**: a removed key never appears in a later query
//! - **Boundary policies**: clamped planes reject out-of-range positions,
//!   toroidal planes wrap them and measure distance around the seam
//! - **Lazy results**: radius queries walk the covering grid cells on demand
//! - **Deterministic ordering**: `nearest` sorts by distance, then by key
//!
//! ## Quick Start
//!
//! ```
//! use canopy::{Boundary, FieldConfig, SpatialField};
//! use glam::DVec2;
//!
//! let mut field = SpatialField::new(FieldConfig {
//!     width: 200.0,
//!     height: 200.0,
//!     boundary: Boundary::Toroidal,
//!     cell_size: 10.0,
//! })
//! .unwrap();
//!
//! field.insert(1_u64, DVec2::new(5.0, 5.0)).unwrap();
//! field.insert(2_u64, DVec2::new(195.0, 5.0)).unwrap();
//!
//! // Key 2 is 10 units away across the wrapped edge.
//! let mut near: Vec<u64> = field.query_radius(DVec2::new(5.0, 5.0), 12.0).collect();
//! near.sort_unstable();
//! assert_eq!(near, vec![1, 2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boundary;
pub mod error;
pub mod field;
mod grid;
pub mod query;

use std::fmt;
use std::hash::Hash;

pub use boundary::Boundary;
pub use error::FieldError;
pub use field::{FieldConfig, SpatialField};
pub use query::{Neighbor, RadiusQuery};

/// Requirements for a type used to key positions in a [`SpatialField`].
///
/// Keys must be cheap to copy and totally ordered so that tie-breaks in
/// [`SpatialField::nearest`] are deterministic.
pub trait FieldKey: Copy + Ord + Hash + fmt::Debug {}

impl<T: Copy + Ord + Hash + fmt::Debug> FieldKey for T {}

/// Rectangular extent `[0, width) x [0, height)` of a field.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    /// Size along the x axis
    pub width: f64,
    /// Size along the y axis
    pub height: f64,
}

impl Extent {
    /// Create an extent from its dimensions.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Check that both dimensions are finite and strictly positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Check if a point lies in the half-open extent.
    #[must_use]
    pub fn contains(&self, point: glam::DVec2) -> bool {
        point.x >= 0.0 && point.x < self.width && point.y >= 0.0 && point.y < self.height
    }

    /// Size as a vector.
    #[must_use]
    pub fn size(&self) -> glam::DVec2 {
        glam::DVec2::new(self.width, self.height)
    }

    /// Length of the diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.size().length()
    }

    /// Distance from `point` to the farthest corner of the extent.
    ///
    /// Every stored point is within this distance of `point`.
    #[must_use]
    pub fn farthest_corner_distance(&self, point: glam::DVec2) -> f64 {
        let dx = point.x.abs().max((self.width - point.x).abs());
        let dy = point.y.abs().max((self.height - point.y).abs());
        glam::DVec2::new(dx, dy).length()
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new(200.0, 200.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn test_extent_contains_is_half_open() {
        let extent = Extent::new(10.0, 10.0);
        assert!(extent.contains(DVec2::ZERO));
        assert!(extent.contains(DVec2::new(9.999, 9.999)));
        assert!(!extent.contains(DVec2::new(10.0, 0.0)));
        assert!(!extent.contains(DVec2::new(0.0, -0.1)));
    }

    #[test]
    fn test_extent_validity() {
        assert!(Extent::new(1.0, 2.0).is_valid());
        assert!(!Extent::new(0.0, 2.0).is_valid());
        assert!(!Extent::new(f64::INFINITY, 2.0).is_valid());
        assert!(!Extent::new(5.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_farthest_corner() {
        let extent = Extent::new(3.0, 4.0);
        assert!((extent.farthest_corner_distance(DVec2::ZERO) - 5.0).abs() < 1e-12);
        assert!((extent.farthest_corner_distance(DVec2::new(-3.0, 0.0)) - (36.0_f64 + 16.0).sqrt()).abs() < 1e-12);
    }
}
