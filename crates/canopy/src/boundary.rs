//! Boundary policies.
//!
//! A boundary decides what happens to coordinates outside the extent and how
//! the distance between two stored points is measured. Storage and queries
//! always go through the same policy.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::Extent;

/// Edge behaviour of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Positions outside the extent are rejected; distance is Euclidean.
    Clamped,
    /// Positions wrap around each edge; distance takes the shortest way
    /// around the torus.
    #[default]
    Toroidal,
}

impl Boundary {
    /// Map a requested position onto the stored position.
    ///
    /// Returns `None` when the policy cannot accept the position: anything
    /// outside the extent for [`Boundary::Clamped`], and non-finite
    /// coordinates for either policy.
    #[must_use]
    pub fn resolve(self, extent: Extent, point: DVec2) -> Option<DVec2> {
        if !point.is_finite() {
            return None;
        }
        match self {
            Self::Clamped => extent.contains(point).then_some(point),
            Self::Toroidal => Some(DVec2::new(
                wrap(point.x, extent.width),
                wrap(point.y, extent.height),
            )),
        }
    }

    /// Shortest displacement from `from` to `to` under this policy.
    #[must_use]
    pub fn delta(self, extent: Extent, from: DVec2, to: DVec2) -> DVec2 {
        let d = to - from;
        match self {
            Self::Clamped => d,
            Self::Toroidal => DVec2::new(
                shortest(d.x, extent.width),
                shortest(d.y, extent.height),
            ),
        }
    }

    /// Squared distance between two points under this policy.
    #[must_use]
    pub fn distance_squared(self, extent: Extent, a: DVec2, b: DVec2) -> f64 {
        self.delta(extent, a, b).length_squared()
    }

    /// Distance between two points under this policy.
    #[must_use]
    pub fn distance(self, extent: Extent, a: DVec2, b: DVec2) -> f64 {
        self.distance_squared(extent, a, b).sqrt()
    }

    /// Returns true if coordinates wrap around the edges.
    #[must_use]
    pub const fn wraps(self) -> bool {
        matches!(self, Self::Toroidal)
    }
}

/// Wrap a coordinate into `[0, size)`.
fn wrap(value: f64, size: f64) -> f64 {
    let wrapped = value.rem_euclid(size);
    // rem_euclid rounds tiny negative inputs up to exactly `size`
    if wrapped >= size {
        0.0
    } else {
        wrapped
    }
}

/// Fold a raw axis displacement onto the shorter way around a ring.
fn shortest(d: f64, size: f64) -> f64 {
    let d = d.rem_euclid(size);
    if d > size * 0.5 {
        d - size
    } else {
        d
    }
}
