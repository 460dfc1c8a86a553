//! Bin-packing planner: orders items, chooses a container, orientation, and
//! position, and scores candidate positions.

use std::collections::HashMap;

use crate::candidates::extreme_points;
use crate::config::PlannerConfig;
use crate::error::CoreError;
use crate::geometry::{self, Aabb, Vec3};
use crate::model::{Container, Item, Orientation, Placement};
use crate::spatial::OccupancyIndex;

use super::rearrangement::{plan_rearrangement, RearrangementMove};
use super::{is_aborted, AbortSignal, PlanEvent, UnplacedItem, UnplacedReason};

/// Everything `plan_placements`/`plan_single_placement` need to know about
/// the state of a single container while planning.
pub(crate) struct ContainerState<'a> {
    #[allow(dead_code)]
    container: &'a Container,
    pub(crate) index: OccupancyIndex,
}

impl<'a> ContainerState<'a> {
    fn new(container: &'a Container, cell_fraction: f64) -> Self {
        let min_extent = container.width.min(container.depth).min(container.height);
        Self {
            container,
            index: OccupancyIndex::new((min_extent * cell_fraction).max(1e-3)),
        }
    }

    fn used_volume(&self) -> f64 {
        self.index.occupants().map(|(_, b)| b.volume()).sum()
    }
}

pub(crate) fn build_states<'a>(
    containers: &'a [Container],
    current_placements: &[Placement],
    cell_fraction: f64,
) -> HashMap<&'a str, ContainerState<'a>> {
    let mut states: HashMap<&str, ContainerState> = containers
        .iter()
        .map(|c| (c.id.as_str(), ContainerState::new(c, cell_fraction)))
        .collect();
    for p in current_placements {
        if let Some(state) = states.get_mut(p.container_id.as_str()) {
            state.index.insert(p.item_id.clone(), p.bounds());
        }
    }
    states
}

/// The orientations of `item` whose effective dimensions fit within
/// `container`'s bounding box, deduplicated (mirrors `geometry::orientations`
/// but keeps the `Orientation` tag needed for the resulting `Placement`).
pub(crate) fn fitting_orientations(item: &Item, container: &Container) -> Vec<(Orientation, (f64, f64, f64))> {
    let mut out = Vec::with_capacity(6);
    for orientation in Orientation::ALL {
        let dims = orientation.apply(item.width, item.depth, item.height);
        if dims.0 > container.width + geometry::EPSILON
            || dims.1 > container.depth + geometry::EPSILON
            || dims.2 > container.height + geometry::EPSILON
        {
            continue;
        }
        let dup = out.iter().any(|(_, d): &(Orientation, (f64, f64, f64))| {
            (d.0 - dims.0).abs() < geometry::EPSILON
                && (d.1 - dims.1).abs() < geometry::EPSILON
                && (d.2 - dims.2).abs() < geometry::EPSILON
        });
        if !dup {
            out.push((orientation, dims));
        }
    }
    out
}

/// `waste = z_penalty + wall_proximity + contact_bonus`, lower is better.
fn score_position(
    corner: Vec3,
    dims: (f64, f64, f64),
    container: &Container,
    placed: &[Aabb],
) -> f64 {
    let z_penalty = 3.0 * corner.z;
    let wall_proximity = (corner.x).min(container.width - (corner.x + dims.0))
        + (corner.y).min(container.depth - (corner.y + dims.1));
    let candidate = Aabb::from_corner_and_dims(corner, dims);
    let contact_bonus = placed
        .iter()
        .map(|b| geometry::linf_distance(&candidate, b))
        .fold(f64::INFINITY, f64::min);
    let contact_bonus = if contact_bonus.is_finite() { contact_bonus } else { 0.0 };
    z_penalty + wall_proximity + contact_bonus
}

pub(crate) const EARLY_EXIT_WASTE: f64 = 1.0;

pub(crate) struct BestCandidate {
    pub(crate) container_id: String,
    pub(crate) orientation: Orientation,
    pub(crate) corner: Vec3,
    pub(crate) dims: (f64, f64, f64),
    pub(crate) waste: f64,
}

/// Searches every shortlisted container (in the order the caller already
/// sorted them) and every fitting orientation for the best-scoring free
/// position, returning early the moment a position scores under
/// `EARLY_EXIT_WASTE`.
pub(crate) fn search_best_position<'a>(
    item: &Item,
    container_order: impl Iterator<Item = &'a Container>,
    states: &HashMap<&str, ContainerState<'a>>,
    config: &PlannerConfig,
) -> Option<BestCandidate> {
    let mut best: Option<BestCandidate> = None;
    for container in container_order {
        let state = states.get(container.id.as_str())?;
        let used_ratio = state.used_volume() / container.volume();
        if used_ratio > config.fill_threshold {
            continue;
        }
        let placed_boxes: Vec<Aabb> = state.index.occupants().map(|(_, b)| *b).collect();
        let bounds = container.bounds();
        for (orientation, dims) in fitting_orientations(item, container) {
            for corner in extreme_points(dims, &bounds, &placed_boxes) {
                let candidate_box = Aabb::from_corner_and_dims(corner, dims);
                if !state.index.is_free(&candidate_box) {
                    continue;
                }
                let waste = score_position(corner, dims, container, &placed_boxes);
                let is_new_best = best.as_ref().map(|b| waste < b.waste).unwrap_or(true);
                if is_new_best {
                    best = Some(BestCandidate {
                        container_id: container.id.clone(),
                        orientation,
                        corner,
                        dims,
                        waste,
                    });
                }
                if waste < EARLY_EXIT_WASTE {
                    return best;
                }
            }
        }
    }
    best
}

/// Containers restricted to `item`'s preferred zone, ordered per step 3:
/// small items (volume < `small_item_ratio` x zone mean) ascending volume,
/// large items descending.
pub(crate) fn ordered_zone_containers<'a>(item: &Item, containers: &'a [Container], config: &PlannerConfig) -> Vec<&'a Container> {
    let mut zone: Vec<&Container> = containers.iter().filter(|c| c.zone == item.preferred_zone).collect();
    if zone.is_empty() {
        return zone;
    }
    let mean_volume: f64 = zone.iter().map(|c| c.volume()).sum::<f64>() / zone.len() as f64;
    let is_small = item.volume() < config.small_item_ratio * mean_volume;
    if is_small {
        zone.sort_by(|a, b| a.volume().partial_cmp(&b.volume()).unwrap());
    } else {
        zone.sort_by(|a, b| b.volume().partial_cmp(&a.volume()).unwrap());
    }
    zone
}

/// Sorts items by `(priority desc, volume desc, id asc)` per step 1.
pub fn order_items<'a>(items: &'a [Item]) -> Vec<&'a Item> {
    let mut ordered: Vec<&Item> = items.iter().collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.volume().partial_cmp(&a.volume()).unwrap())
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

pub struct PlacementOutcome {
    pub new_placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedItem>,
    /// Moves applied by the rearrangement planner (§4.F) to free space for
    /// items that had no direct fit — empty unless at least one item
    /// triggered a successful rearrangement. Matches spec.md §6's
    /// `plan_placements(...) -> (new_placements, unplaced, rearrangement_steps)`.
    pub rearrangement_steps: Vec<RearrangementMove>,
    /// Final placements of already-placed items that a rearrangement moved
    /// to make room for one of `new_placements`. A caller applying this
    /// outcome to a live world must overwrite these items' placements (not
    /// just insert `new_placements`) or its occupancy state will diverge
    /// from `rearrangement_steps`.
    pub relocated: Vec<Placement>,
}

fn relocate_in_states<'a>(
    states: &mut HashMap<&'a str, ContainerState<'a>>,
    old: &Placement,
    new: &Placement,
) {
    if let Some(state) = states.get_mut(old.container_id.as_str()) {
        state.index.remove(&old.item_id);
    }
    if let Some(state) = states.get_mut(new.container_id.as_str()) {
        let bx = new.bounds();
        debug_assert!(state.index.is_free(&bx), "relocated placement must land on free space");
        state.index.insert(new.item_id.clone(), bx);
    }
}

/// Places as many `items` as possible into `containers`, given the
/// placements already in effect. Purely functional over the snapshot; the
/// caller must serialize concurrent calls against the same world (§5).
/// When an item has no direct fit, falls back to the rearrangement planner
/// (§4.F) before giving up on it.
pub fn plan_placements(
    items: &[Item],
    containers: &[Container],
    current_placements: &[Placement],
    config: &PlannerConfig,
    abort: Option<&AbortSignal>,
    mut on_event: impl FnMut(&PlanEvent),
) -> PlacementOutcome {
    let mut states = build_states(containers, current_placements, config.grid_cell_fraction);
    let mut new_placements = Vec::new();
    let mut unplaced = Vec::new();
    let mut rearrangement_steps = Vec::new();
    let mut relocated: Vec<Placement> = Vec::new();
    let mut live: Vec<Placement> = current_placements.to_vec();

    for item in order_items(items) {
        if is_aborted(abort) {
            let reason = UnplacedReason::Aborted;
            on_event(&PlanEvent::ItemUnplaced {
                item_id: item.id.clone(),
                reason: reason.clone(),
            });
            unplaced.push(UnplacedItem {
                item_id: item.id.clone(),
                reason,
            });
            continue;
        }

        let zone_containers = ordered_zone_containers(item, containers, config);
        if zone_containers.is_empty() {
            let reason = UnplacedReason::NoContainersInZone;
            on_event(&PlanEvent::ItemUnplaced {
                item_id: item.id.clone(),
                reason: reason.clone(),
            });
            unplaced.push(UnplacedItem {
                item_id: item.id.clone(),
                reason,
            });
            continue;
        }

        match search_best_position(item, zone_containers.into_iter(), &states, config) {
            Some(best) => {
                let placement = Placement {
                    item_id: item.id.clone(),
                    container_id: best.container_id.clone(),
                    orientation: best.orientation,
                    min_corner: best.corner.as_tuple(),
                    effective_dims: best.dims,
                };
                let state = states.get_mut(best.container_id.as_str()).expect("container state exists");
                let bx = placement.bounds();
                debug_assert!(state.index.is_free(&bx), "committed placement must be free");
                state.index.insert(item.id.clone(), bx);
                on_event(&PlanEvent::ItemPlaced {
                    item_id: item.id.clone(),
                    container_id: best.container_id.clone(),
                });
                live.push(placement.clone());
                new_placements.push(placement);
            }
            None => {
                let outcome = plan_rearrangement(item, containers, items, &live, config);
                if outcome.success {
                    for relocation in &outcome.relocated {
                        if let Some(old) = live.iter().find(|p| p.item_id == relocation.item_id).cloned() {
                            relocate_in_states(&mut states, &old, relocation);
                        }
                        live.retain(|p| p.item_id != relocation.item_id);
                        live.push(relocation.clone());
                        relocated.retain(|p: &Placement| p.item_id != relocation.item_id);
                        relocated.push(relocation.clone());
                    }
                    if let Some(incoming_placement) = outcome.incoming_placement.clone() {
                        if let Some(state) = states.get_mut(incoming_placement.container_id.as_str()) {
                            let bx = incoming_placement.bounds();
                            debug_assert!(state.index.is_free(&bx), "rearranged placement must land on free space");
                            state.index.insert(incoming_placement.item_id.clone(), bx);
                        }
                        live.push(incoming_placement.clone());
                        on_event(&PlanEvent::RearrangementApplied {
                            item_id: item.id.clone(),
                            move_count: outcome.moves.len(),
                        });
                        rearrangement_steps.extend(outcome.moves);
                        new_placements.push(incoming_placement);
                        continue;
                    }
                }

                let reason = UnplacedReason::NoFit;
                on_event(&PlanEvent::ItemUnplaced {
                    item_id: item.id.clone(),
                    reason: reason.clone(),
                });
                unplaced.push(UnplacedItem {
                    item_id: item.id.clone(),
                    reason,
                });
            }
        }
    }

    on_event(&PlanEvent::Finished {
        placed: new_placements.len(),
        unplaced: unplaced.len(),
    });

    PlacementOutcome {
        new_placements,
        unplaced,
        rearrangement_steps,
        relocated,
    }
}

/// Places a single item into a specific container, either at a caller-
/// supplied position (validated, not searched) or, if `requested_position`
/// is `None`, at the best position §4.D.5–7 would choose within that one
/// container.
pub fn plan_single_placement(
    item: &Item,
    container: &Container,
    requested_position: Option<(f64, f64, f64)>,
    current_placements: &[Placement],
    config: &PlannerConfig,
) -> Result<Placement, CoreError> {
    let containers = std::slice::from_ref(container);
    let mut states = build_states(containers, current_placements, config.grid_cell_fraction);
    let state = states.get_mut(container.id.as_str()).expect("single container state");

    if let Some(corner) = requested_position {
        let corner = Vec3::from_tuple(corner);
        let fitting = fitting_orientations(item, container);
        for (orientation, dims) in fitting {
            let candidate = Aabb::from_corner_and_dims(corner, dims);
            if !geometry::contains(&container.bounds(), &candidate) {
                continue;
            }
            if !state.index.is_free(&candidate) {
                continue;
            }
            return Ok(Placement {
                item_id: item.id.clone(),
                container_id: container.id.clone(),
                orientation,
                min_corner: corner.as_tuple(),
                effective_dims: dims,
            });
        }
        return Err(CoreError::no_fit(format!(
            "requested position does not fit item {} into container {}",
            item.id, container.id
        )));
    }

    let placed_boxes: Vec<Aabb> = state.index.occupants().map(|(_, b)| *b).collect();
    let bounds = container.bounds();
    let mut best: Option<BestCandidate> = None;
    for (orientation, dims) in fitting_orientations(item, container) {
        for corner in extreme_points(dims, &bounds, &placed_boxes) {
            let candidate_box = Aabb::from_corner_and_dims(corner, dims);
            if !state.index.is_free(&candidate_box) {
                continue;
            }
            let waste = score_position(corner, dims, container, &placed_boxes);
            let is_new_best = best.as_ref().map(|b| waste < b.waste).unwrap_or(true);
            if is_new_best {
                best = Some(BestCandidate {
                    container_id: container.id.clone(),
                    orientation,
                    corner,
                    dims,
                    waste,
                });
            }
            if waste < EARLY_EXIT_WASTE {
                break;
            }
        }
    }

    best.map(|b| Placement {
        item_id: item.id.clone(),
        container_id: b.container_id,
        orientation: b.orientation,
        min_corner: b.corner.as_tuple(),
        effective_dims: b.dims,
    })
    .ok_or_else(|| CoreError::no_fit(format!("no free position for item {} in container {}", item.id, container.id)))
}

/// Finds the best-scoring free position for `item` among the containers in
/// its preferred zone, given `current_placements`. Shared by the batch
/// planner and the rearrangement planner (§4.F), which re-runs this search
/// against a placements set with candidate evictees removed.
pub(crate) fn find_best_position(
    item: &Item,
    containers: &[Container],
    current_placements: &[Placement],
    config: &PlannerConfig,
) -> Option<BestCandidate> {
    let states = build_states(containers, current_placements, config.grid_cell_fraction);
    let zone_containers = ordered_zone_containers(item, containers, config);
    search_best_position(item, zone_containers.into_iter(), &states, config)
}

/// Finds any free position for `dims` among exactly `containers` (no zone
/// filter, no small/large ordering) — used by the rearrangement planner to
/// place a displaced item in a temporary slot anywhere in the target zone.
pub(crate) fn any_free_position(
    dims_item: (f64, f64, f64),
    containers: &[Container],
    current_placements: &[Placement],
    config: &PlannerConfig,
) -> Option<(String, Orientation, Vec3, (f64, f64, f64))> {
    let states = build_states(containers, current_placements, config.grid_cell_fraction);
    for container in containers {
        let Some(state) = states.get(container.id.as_str()) else { continue };
        let placed_boxes: Vec<Aabb> = state.index.occupants().map(|(_, b)| *b).collect();
        let bounds = container.bounds();
        for orientation in Orientation::ALL {
            let dims = orientation.apply(dims_item.0, dims_item.1, dims_item.2);
            if dims.0 > container.width + geometry::EPSILON
                || dims.1 > container.depth + geometry::EPSILON
                || dims.2 > container.height + geometry::EPSILON
            {
                continue;
            }
            for corner in extreme_points(dims, &bounds, &placed_boxes) {
                let candidate_box = Aabb::from_corner_and_dims(corner, dims);
                if state.index.is_free(&candidate_box) {
                    return Some((container.id.clone(), orientation, corner, dims));
                }
            }
        }
    }
    None
}
