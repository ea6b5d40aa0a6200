//! Query results.
//!
//! Radius queries are lazy: a [`RadiusQuery`] borrows the field and walks the
//! covering grid cells only as it is advanced. It is finite and cannot be
//! restarted; query again for a fresh pass.

use std::iter::FusedIterator;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::{Boundary, Extent, FieldKey};

/// A key found by a query together with its distance from the query center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor<K> {
    /// Key of the stored point
    pub key: K,
    /// Distance from the query center under the field's boundary policy
    pub distance: f64,
}

/// Lazy iterator over the keys within a radius of a center point.
///
/// Yields each matching key exactly once, in unspecified order.
#[derive(Debug)]
pub struct RadiusQuery<'a, K> {
    grid: &'a Grid<K>,
    extent: Extent,
    boundary: Boundary,
    center: DVec2,
    radius_sq: f64,
    cells: std::vec::IntoIter<usize>,
    current: std::slice::Iter<'a, (K, DVec2)>,
}

impl<'a, K: FieldKey> RadiusQuery<'a, K> {
    pub(crate) fn new(
        grid: &'a Grid<K>,
        extent: Extent,
        boundary: Boundary,
        center: DVec2,
        radius: f64,
    ) -> Self {
        let cells = grid.cells_covering(center, radius, boundary);
        let none: &[(K, DVec2)] = &[];
        Self {
            grid,
            extent,
            boundary,
            center,
            radius_sq: radius * radius,
            cells: cells.into_iter(),
            current: none.iter(),
        }
    }

    pub(crate) fn empty(grid: &'a Grid<K>, extent: Extent, boundary: Boundary) -> Self {
        let none: &[(K, DVec2)] = &[];
        Self {
            grid,
            extent,
            boundary,
            center: DVec2::ZERO,
            radius_sq: 0.0,
            cells: Vec::new().into_iter(),
            current: none.iter(),
        }
    }
}

impl<K: FieldKey> Iterator for RadiusQuery<'_, K> {
    type Item = Neighbor<K>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for (key, position) in self.current.by_ref() {
                let d2 = self
                    .boundary
                    .distance_squared(self.extent, self.center, *position);
                if d2 <= self.radius_sq {
                    return Some(Neighbor {
                        key: *key,
                        distance: d2.sqrt(),
                    });
                }
            }
            let cell = self.cells.next()?;
            self.current = self.grid.bucket(cell).iter();
        }
    }
}

impl<K: FieldKey> FusedIterator for RadiusQuery<'_, K> {}

/// Sort neighbors by ascending distance, breaking ties by key.
pub(crate) fn sort_by_distance<K: FieldKey>(neighbors: &mut [Neighbor<K>]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.key.cmp(&b.key))
    });
}
