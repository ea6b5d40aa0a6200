//! The spatial field: keyed positions plus a bucket-grid index.
//!
//! Every mutation updates the position table and the grid together, so a
//! query issued after `insert`, `move_to` or `remove` returns sees
//! the latest committed positions.

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::Grid;
use crate::query::{sort_by_distance, Neighbor, RadiusQuery};
use crate::{Boundary, Extent, FieldError, FieldKey};

/// Configuration for a [`SpatialField`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field width
    pub width: f64,
    /// Field height
    pub height: f64,
    /// Edge policy applied to storage and distance
    pub boundary: Boundary,
    /// Target edge length of a grid bucket; works best near the typical
    /// query radius
    pub cell_size: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 200.0,
            boundary: Boundary::default(),
            cell_size: 10.0,
        }
    }
}

impl FieldConfig {
    /// Create a config with the given dimensions and default boundary and
    /// cell size.
    #[must_use]
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// The extent described by this config.
    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    position: DVec2,
    cell: usize,
}

/// Keyed point positions in a bounded 2-D plane.
#[derive(Debug, Clone)]
pub struct SpatialField<K> {
    extent: Extent,
    boundary: Boundary,
    slots: BTreeMap<K, Slot>,
    grid: Grid<K>,
}

impl<K: FieldKey> SpatialField<K> {
    /// Create an empty field.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidConfig`] if a dimension or the cell size
    /// is not finite and strictly positive.
    pub fn new(config: FieldConfig) -> Result<Self, FieldError<K>> {
        let extent = config.extent();
        if !extent.is_valid() {
            return Err(FieldError::InvalidConfig(
                "width and height must be finite and positive",
            ));
        }
        if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
            return Err(FieldError::InvalidConfig(
                "cell_size must be finite and positive",
            ));
        }
        let grid = Grid::new(extent, config.cell_size);
        let (cols, rows) = grid.dimensions();
        debug!(
            width = extent.width,
            height = extent.height,
            boundary = ?config.boundary,
            cols,
            rows,
            "created spatial field"
        );
        Ok(Self {
            extent,
            boundary: config.boundary,
            slots: BTreeMap::new(),
            grid,
        })
    }

    /// The field extent.
    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// The boundary policy.
    #[must_use]
    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Grid dimensions as `(cols, rows)`.
    #[must_use]
    pub fn grid_dimensions(&self) -> (usize, usize) {
        self.grid.dimensions()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if `key` is stored.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    /// Stored position of `key`.
    #[must_use]
    pub fn position(&self, key: K) -> Option<DVec2> {
        self.slots.get(&key).map(|slot| slot.position)
    }

    /// Iterate over all stored keys and positions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, DVec2)> + '_ {
        self.slots.iter().map(|(key, slot)| (*key, slot.position))
    }

    /// Apply the boundary policy to a position without storing it.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::OutOfBounds`] if the policy rejects the position.
    pub fn normalize(&self, position: DVec2) -> Result<DVec2, FieldError<K>> {
        self.boundary
            .resolve(self.extent, position)
            .ok_or(FieldError::OutOfBounds {
                x: position.x,
                y: position.y,
                width: self.extent.width,
                height: self.extent.height,
            })
    }

    /// Distance between two points under the field's boundary policy.
    #[must_use]
    pub fn distance(&self, a: DVec2, b: DVec2) -> f64 {
        self.boundary.distance(self.extent, a, b)
    }

    /// Store a new key. Returns the stored (normalized) position.
    ///
    /// # Errors
    ///
    /// - [`FieldError::DuplicateAgent`] if `key` is already stored
    /// - [`FieldError::OutOfBounds`] if the boundary policy rejects `position`
    pub fn insert(&mut self, key: K, position: DVec2) -> Result<DVec2, FieldError<K>> {
        if self.slots.contains_key(&key) {
            return Err(FieldError::DuplicateAgent(key));
        }
        let position = self.normalize(position)?;
        let cell = self.grid.cell_of(position);
        self.grid.insert(cell, key, position);
        self.slots.insert(key, Slot { position, cell });
        Ok(position)
    }

    /// Move a stored key. Returns the stored (normalized) position.
    ///
    /// On error the field is unchanged.
    ///
    /// # Errors
    ///
    /// - [`FieldError::UnknownKey`] if `key` is not stored
    /// - [`FieldError::OutOfBounds`] if the boundary policy rejects `position`
    pub fn move_to(&mut self, key: K, position: DVec2) -> Result<DVec2, FieldError<K>> {
        let position = self.normalize(position)?;
        let slot = self
            .slots
            .get_mut(&key)
            .ok_or(FieldError::UnknownKey(key))?;
        let cell = self.grid.cell_of(position);
        if cell == slot.cell {
            let updated = self.grid.update(cell, key, position);
            debug_assert!(updated, "grid bucket lost key {key:?}");
        } else {
            let removed = self.grid.remove(slot.cell, key);
            debug_assert!(removed, "grid bucket lost key {key:?}");
            self.grid.insert(cell, key, position);
        }
        *slot = Slot { position, cell };
        Ok(position)
    }

    /// Remove a stored key. Returns its last position.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownKey`] if `key` is not stored.
    pub fn remove(&mut self, key: K) -> Result<DVec2, FieldError<K>> {
        let slot = self.slots.remove(&key).ok_or(FieldError::UnknownKey(key))?;
        let removed = self.grid.remove(slot.cell, key);
        debug_assert!(removed, "grid bucket lost key {key:?}");
        debug_assert_eq!(self.grid.entry_count(), self.slots.len());
        Ok(slot.position)
    }

    /// Keys within `radius` of `center`, inclusive, with their distances.
    ///
    /// Under a toroidal policy `center` is wrapped first. A negative or NaN
    /// radius, or a non-finite center, yields nothing.
    pub fn neighbors_within(&self, center: DVec2, radius: f64) -> RadiusQuery<'_, K> {
        let center = match self.boundary.resolve(self.extent, center) {
            Some(c) => c,
            None if self.boundary.wraps() || !center.is_finite() => {
                return RadiusQuery::empty(&self.grid, self.extent, self.boundary);
            }
            // Clamped fields accept query centers outside the extent.
            None => center,
        };
        if radius.is_nan() || radius < 0.0 {
            return RadiusQuery::empty(&self.grid, self.extent, self.boundary);
        }
        // Every stored point lies within the farthest-corner distance; the
        // margin keeps rounding at that distance on the inclusive side.
        let radius = radius.min(2.0 * self.extent.farthest_corner_distance(center) + 1.0);
        RadiusQuery::new(&self.grid, self.extent, self.boundary, center, radius)
    }

    /// Keys within `radius` of `center`, inclusive, in unspecified order.
    pub fn query_radius(&self, center: DVec2, radius: f64) -> impl Iterator<Item = K> + '_ {
        self.neighbors_within(center, radius).map(|n| n.key)
    }

    /// The `k` keys closest to `center`, with distances, ordered by
    /// non-decreasing distance and then by key.
    #[must_use]
    pub fn nearest_neighbors(&self, center: DVec2, k: usize) -> Vec<Neighbor<K>> {
        if k == 0 || self.slots.is_empty() {
            return Vec::new();
        }
        let reach = match self.boundary.resolve(self.extent, center) {
            Some(c) => self.extent.farthest_corner_distance(c),
            None if self.boundary.wraps() || !center.is_finite() => return Vec::new(),
            None => self.extent.farthest_corner_distance(center),
        };
        let (cols, rows) = self.grid.dimensions();
        #[allow(clippy::cast_precision_loss)]
        let mut radius = (self.extent.width / cols as f64).max(self.extent.height / rows as f64);
        loop {
            let mut found: Vec<Neighbor<K>> = self.neighbors_within(center, radius).collect();
            // With k hits inside the radius, the k closest are all among them.
            if found.len() >= k || radius.is_infinite() {
                sort_by_distance(&mut found);
                found.truncate(k);
                return found;
            }
            radius *= 2.0;
            if radius >= reach {
                radius = f64::INFINITY;
            }
        }
    }

    /// The `k` keys closest to `center`, ordered by non-decreasing distance
    /// and then by key.
    pub fn nearest(&self, center: DVec2, k: usize) -> impl Iterator<Item = K> {
        self.nearest_neighbors(center, k).into_iter().map(|n| n.key)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u16, f64, f64),
        Move(u16, f64, f64),
        Remove(u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0_u16..40, -50.0..150.0_f64, -50.0..150.0_f64).prop_map(|(k, x, y)| Op::Insert(k, x, y)),
            (0_u16..40, -50.0..150.0_f64, -50.0..150.0_f64).prop_map(|(k, x, y)| Op::Move(k, x, y)),
            (0_u16..40).prop_map(Op::Remove),
        ]
    }

    fn boundary() -> impl Strategy<Value = Boundary> {
        prop_oneof![Just(Boundary::Clamped), Just(Boundary::Toroidal)]
    }

    /// Apply the ops to both the field and a plain map, ignoring rejected ops.
    fn replay(boundary: Boundary, cell_size: f64, ops: &[Op]) -> (SpatialField<u16>, BTreeMap<u16, DVec2>) {
        let mut field = SpatialField::new(FieldConfig {
            width: 100.0,
            height: 80.0,
            boundary,
            cell_size,
        })
        .unwrap();
        let mut model = BTreeMap::new();
        for op in ops {
            match *op {
                Op::Insert(k, x, y) => {
                    if let Ok(p) = field.insert(k, DVec2::new(x, y)) {
                        assert!(model.insert(k, p).is_none());
                    }
                }
                Op::Move(k, x, y) => {
                    if let Ok(p) = field.move_to(k, DVec2::new(x, y)) {
                        assert!(model.insert(k, p).is_some());
                    }
                }
                Op::Remove(k) => {
                    if field.remove(k).is_ok() {
                        assert!(model.remove(&k).is_some());
                    }
                }
            }
        }
        (field, model)
    }

    proptest! {
        #[test]
        fn radius_query_matches_brute_force(
            boundary in boundary(),
            cell_size in 3.0..40.0_f64,
            ops in prop::collection::vec(op(), 0..120),
            cx in 0.0..100.0_f64,
            cy in 0.0..80.0_f64,
            radius in 0.0..70.0_f64,
        ) {
            let (field, model) = replay(boundary, cell_size, &ops);
            let center = DVec2::new(cx, cy);

            let mut got: Vec<u16> = field.query_radius(center, radius).collect();
            got.sort_unstable();
            let expected: Vec<u16> = model
                .iter()
                .filter(|(_, p)| {
                    field.boundary().distance_squared(field.extent(), center, **p) <= radius * radius
                })
                .map(|(k, _)| *k)
                .collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn stored_positions_are_inside_extent(
            boundary in boundary(),
            ops in prop::collection::vec(op(), 0..80),
        ) {
            let (field, model) = replay(boundary, 10.0, &ops);
            prop_assert_eq!(field.len(), model.len());
            for (key, position) in field.iter() {
                prop_assert!(field.extent().contains(position));
                prop_assert_eq!(model.get(&key).copied(), Some(position));
            }
        }

        #[test]
        fn nearest_is_sorted_prefix_of_all_distances(
            boundary in boundary(),
            ops in prop::collection::vec(op(), 0..80),
            cx in 0.0..100.0_f64,
            cy in 0.0..80.0_f64,
            k in 0_usize..12,
        ) {
            let (field, model) = replay(boundary, 7.0, &ops);
            let center = DVec2::new(cx, cy);

            let mut all: Vec<Neighbor<u16>> = model
                .iter()
                .map(|(key, p)| Neighbor { key: *key, distance: field.distance(center, *p) })
                .collect();
            sort_by_distance(&mut all);
            all.truncate(k);
            let expected: Vec<u16> = all.iter().map(|n| n.key).collect();

            let got: Vec<u16> = field.nearest(center, k).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
