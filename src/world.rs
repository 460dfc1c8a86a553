//! The in-memory world snapshot: containers, items, active placements, and
//! the waste manifest, keyed by id exclusively (never by shared dimensions —
//! see the design notes on the teacher's dimension-keyed caching bug).

use std::collections::HashMap;

use crate::error::CoreError;
use crate::model::{Container, Item, Placement, WasteEntry};

/// Aggregate snapshot the core planners operate on. Owned entirely by the
/// adapter; the core never performs I/O against it.
#[derive(Clone, Debug, Default)]
pub struct World {
    pub containers: HashMap<String, Container>,
    pub items: HashMap<String, Item>,
    pub placements: HashMap<String, Placement>,
    pub waste: Vec<WasteEntry>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container_list(&self) -> Vec<Container> {
        self.containers.values().cloned().collect()
    }

    pub fn item_list(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn placement_list(&self) -> Vec<Placement> {
        self.placements.values().cloned().collect()
    }

    pub fn container(&self, id: &str) -> Result<&Container, CoreError> {
        self.containers
            .get(id)
            .ok_or_else(|| CoreError::not_found(format!("container {id} not registered")))
    }

    pub fn item(&self, id: &str) -> Result<&Item, CoreError> {
        self.items
            .get(id)
            .ok_or_else(|| CoreError::not_found(format!("item {id} not in catalog")))
    }

    pub fn register_container(&mut self, container: Container) {
        self.containers.insert(container.id.clone(), container);
    }

    pub fn register_item(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Commits a batch of new placements, none of which may already have an
    /// active placement (§3 invariant 3: an item id appears in at most one
    /// active placement).
    pub fn apply_placements(&mut self, placements: Vec<Placement>) {
        for p in placements {
            self.placements.insert(p.item_id.clone(), p);
        }
    }

    /// Atomically replaces a placement's container/orientation/min_corner as
    /// part of a rearrangement move.
    pub fn move_placement(&mut self, placement: Placement) {
        self.placements.insert(placement.item_id.clone(), placement);
    }

    /// Destroys a placement (item undocked or routed to waste). Idempotent.
    pub fn remove_placement(&mut self, item_id: &str) {
        self.placements.remove(item_id);
    }

    pub fn push_waste(&mut self, entry: WasteEntry) {
        self.waste.push(entry);
    }
}

/// `itemId` accepted as integer or string. For a string, extract the
/// trailing run of digits; if none, attempt integer parse of the whole
/// string; otherwise reject (spec.md §6, grounded in the Python reference's
/// `validate_item_id` pydantic validator).
pub fn normalize_item_id(raw: &str) -> Result<String, CoreError> {
    let trailing_digits: String = raw.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if !trailing_digits.is_empty() {
        let digits: String = trailing_digits.chars().rev().collect();
        return Ok(digits);
    }
    if raw.parse::<i64>().is_ok() {
        return Ok(raw.to_string());
    }
    Err(CoreError::invalid_input(format!(
        "invalid itemId '{raw}': must be an integer or a string ending with digits"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_digits_are_extracted() {
        assert_eq!(normalize_item_id("test-item-42").unwrap(), "42");
    }

    #[test]
    fn whole_string_integer_is_accepted() {
        assert_eq!(normalize_item_id("7").unwrap(), "7");
    }

    #[test]
    fn non_numeric_string_is_rejected() {
        assert!(normalize_item_id("no-digits-here").is_err());
    }

    #[test]
    fn trailing_digit_run_wins_even_with_a_leading_sign() {
        // The trailing-digit-run rule always takes precedence over a whole-
        // string parse per spec.md §6.
        assert_eq!(normalize_item_id("-3").unwrap(), "3");
    }

    #[test]
    fn world_rejects_placement_against_unregistered_container() {
        let world = World::new();
        assert!(world.container("ghost").is_err());
    }
}
