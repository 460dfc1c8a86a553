//! The three planners: placement, retrieval, rearrangement.

pub mod placement;
pub mod rearrangement;
pub mod retrieval;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

/// Checked between items during a batch placement call; on abort the
/// planner returns the partial result computed so far and marks the
/// remainder unplaced with reason `aborted`.
pub type AbortSignal = Arc<AtomicBool>;

pub fn is_aborted(signal: Option<&AbortSignal>) -> bool {
    signal.map(|s| s.load(Ordering::Relaxed)).unwrap_or(false)
}

/// Why an item could not be placed.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum UnplacedReason {
    NoContainersInZone,
    NoFit,
    Aborted,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct UnplacedItem {
    pub item_id: String,
    pub reason: UnplacedReason,
}

/// Emitted during a batch placement call so a long-running request can be
/// observed over SSE; purely an ambient convenience, not part of the core
/// contract.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlanEvent {
    ItemPlaced { item_id: String, container_id: String },
    ItemUnplaced { item_id: String, reason: UnplacedReason },
    RearrangementApplied { item_id: String, move_count: usize },
    Finished { placed: usize, unplaced: usize },
}
