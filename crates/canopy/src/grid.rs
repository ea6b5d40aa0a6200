//! Uniform bucket grid backing field queries.
//!
//! The grid splits the extent into `cols x rows` equally sized cells. Cell
//! sizes are stretched slightly so that the extent is an exact multiple of
//! the cell size on both axes; this keeps wrapped cell indices aligned with
//! wrapped coordinates.

use glam::DVec2;

use crate::{Boundary, Extent, FieldKey};

/// Upper bound on the number of grid cells.
pub(crate) const MAX_BUCKETS: usize = 1 << 22;

#[derive(Debug, Clone)]
pub(crate) struct Grid<K> {
    cell: DVec2,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<(K, DVec2)>>,
}

impl<K: FieldKey> Grid<K> {
    /// Create an empty grid. `cell_size` must be finite and positive.
    ///
    /// The cell size is doubled until the grid holds at most
    /// [`MAX_BUCKETS`] cells, so any valid extent gets a bounded index.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub(crate) fn new(extent: Extent, cell_size: f64) -> Self {
        let mut cell_size = cell_size;
        let (cols, rows) = loop {
            let cols = (extent.width / cell_size).ceil().max(1.0);
            let rows = (extent.height / cell_size).ceil().max(1.0);
            if cols * rows <= MAX_BUCKETS as f64 {
                break (cols as usize, rows as usize);
            }
            cell_size *= 2.0;
        };
        Self {
            cell: DVec2::new(extent.width / cols as f64, extent.height / rows as f64),
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        }
    }

    /// Number of cells along each axis.
    pub(crate) fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Index of the cell holding a stored (in-extent) position.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn cell_of(&self, p: DVec2) -> usize {
        let cx = ((p.x / self.cell.x) as usize).min(self.cols - 1);
        let cy = ((p.y / self.cell.y) as usize).min(self.rows - 1);
        cy * self.cols + cx
    }

    pub(crate) fn insert(&mut self, cell: usize, key: K, p: DVec2) {
        self.buckets[cell].push((key, p));
    }

    /// Remove `key` from `cell`. Returns false if it was not there.
    pub(crate) fn remove(&mut self, cell: usize, key: K) -> bool {
        let bucket = &mut self.buckets[cell];
        match bucket.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                bucket.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Overwrite the position of `key` inside `cell`.
    pub(crate) fn update(&mut self, cell: usize, key: K, p: DVec2) -> bool {
        match self.buckets[cell].iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                entry.1 = p;
                true
            }
            None => false,
        }
    }

    pub(crate) fn bucket(&self, cell: usize) -> &[(K, DVec2)] {
        &self.buckets[cell]
    }

    /// Total number of entries across all buckets.
    pub(crate) fn entry_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Cells that may contain points within `radius` of `center`.
    ///
    /// `radius` must be finite and non-negative. Each cell appears once.
    pub(crate) fn cells_covering(&self, center: DVec2, radius: f64, boundary: Boundary) -> Vec<usize> {
        let wrap = boundary.wraps();
        let xs = axis_span(center.x - radius, center.x + radius, self.cell.x, self.cols, wrap);
        let ys = axis_span(center.y - radius, center.y + radius, self.cell.y, self.rows, wrap);
        let mut cells = Vec::with_capacity(xs.len() * ys.len());
        for &cy in &ys {
            for &cx in &xs {
                cells.push(cy * self.cols + cx);
            }
        }
        cells
    }
}

/// Cell indices along one axis overlapping `[lo, hi]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn axis_span(lo: f64, hi: f64, cell: f64, count: usize, wrap: bool) -> Vec<usize> {
    let count_i = count as i64;
    let first = (lo / cell).floor() as i64;
    let last = (hi / cell).floor() as i64;
    if wrap {
        if last - first + 1 >= count_i {
            return (0..count).collect();
        }
        (first..=last)
            .map(|i| i.rem_euclid(count_i) as usize)
            .collect()
    } else {
        if last < 0 || first >= count_i {
            return Vec::new();
        }
        let first = first.max(0) as usize;
        let last = last.min(count_i - 1) as usize;
        (first..=last).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_size_divides_extent_exactly() {
        let grid: Grid<u32> = Grid::new(Extent::new(200.0, 100.0), 30.0);
        assert_eq!(grid.dimensions(), (7, 4));
        assert_eq!(grid.cell_of(DVec2::new(199.999, 99.999)), 3 * 7 + 6);
        assert_eq!(grid.cell_of(DVec2::ZERO), 0);
    }

    #[test]
    fn huge_extent_widens_cells_instead_of_overflowing() {
        let grid: Grid<u32> = Grid::new(Extent::new(1e15, 1e15), 10.0);
        let (cols, rows) = grid.dimensions();
        assert!(cols * rows <= MAX_BUCKETS);
        assert_eq!(cols, rows);

        // One long thin axis still ends up bounded.
        let grid: Grid<u32> = Grid::new(Extent::new(1e300, 1.0), 1e-300);
        let (cols, rows) = grid.dimensions();
        assert!(cols * rows <= MAX_BUCKETS);
        assert_eq!(rows, 1);
        assert_eq!(grid.cell_of(DVec2::new(1e300, 0.5)), cols - 1);
    }

    #[test]
    fn wrapped_span_crosses_the_seam() {
        assert_eq!(axis_span(-15.0, 25.0, 10.0, 20, true), vec![18, 19, 0, 1, 2]);
        assert_eq!(axis_span(-95.0, 105.0, 10.0, 20, true).len(), 20);
    }

    #[test]
    fn clamped_span_is_cut_at_edges() {
        assert_eq!(axis_span(-15.0, 25.0, 10.0, 20, false), vec![0, 1, 2]);
        assert_eq!(axis_span(185.0, 260.0, 10.0, 20, false), vec![18, 19]);
        assert!(axis_span(-40.0, -5.0, 10.0, 20, false).is_empty());
        assert!(axis_span(205.0, 220.0, 10.0, 20, false).is_empty());
    }

    #[test]
    fn remove_and_update_report_misses() {
        let mut grid: Grid<u32> = Grid::new(Extent::new(10.0, 10.0), 5.0);
        grid.insert(0, 7, DVec2::new(1.0, 1.0));
        assert!(grid.update(0, 7, DVec2::new(2.0, 2.0)));
        assert!(!grid.update(1, 7, DVec2::new(2.0, 2.0)));
        assert_eq!(grid.bucket(0), &[(7, DVec2::new(2.0, 2.0))]);
        assert!(grid.remove(0, 7));
        assert!(!grid.remove(0, 7));
        assert_eq!(grid.entry_count(), 0);
    }
}
