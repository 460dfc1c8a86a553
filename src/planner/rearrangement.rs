//! Rearrangement planner (§4.F): finds a sequence of moves, with optional
//! temporary positions, that frees space in the incoming item's preferred
//! zone without disturbing more than the policy cost threshold allows.

use serde::Serialize;
use utoipa::ToSchema;

use crate::config::PlannerConfig;
use crate::model::{Container, Item, Placement};

use super::placement::{any_free_position, find_best_position, BestCandidate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MoveKind {
    Temporary,
    Final,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RearrangementMove {
    pub item_id: String,
    pub from_container: String,
    pub from_position: (f64, f64, f64),
    pub to_container: String,
    pub to_position: (f64, f64, f64),
    pub kind: MoveKind,
}

pub struct RearrangementOutcome {
    pub moves: Vec<RearrangementMove>,
    /// The evicted items' new placements, in the same order as the `Final`/
    /// `Temporary` entries of `moves` that relocate an already-placed item
    /// (excludes the incoming item). Lets a caller update its own placement
    /// set/occupancy index without re-deriving orientation from a bare
    /// position, which `moves` alone does not carry.
    pub relocated: Vec<Placement>,
    /// The incoming item's own final placement, set iff `success`.
    pub incoming_placement: Option<Placement>,
    pub success: bool,
}

fn failure() -> RearrangementOutcome {
    RearrangementOutcome {
        moves: Vec::new(),
        relocated: Vec::new(),
        incoming_placement: None,
        success: false,
    }
}

fn euclidean(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2) + (a.2 - b.2).powi(2)).sqrt()
}

/// Cost of moving an item from `from` to `to`: Euclidean distance scaled by
/// `1 + priority/100`, so disturbing a high-priority item is proportionally
/// more expensive (§4.F.4).
fn move_cost(from: (f64, f64, f64), to: (f64, f64, f64), priority: u8) -> f64 {
    euclidean(from, to) * (1.0 + priority as f64 / 100.0)
}

struct Evictee<'a> {
    item: &'a Item,
    placement: Placement,
}

/// Places `incoming_item` by iteratively widening the pool of low-priority
/// items in its preferred zone that may be evicted (k = 10%, 20%, ... 100%),
/// relocating each evictee to a final or temporary slot, and accepting the
/// plan only if the total rearrangement cost stays under
/// `config.rearrangement_cost_threshold`. No partial mutation: on failure
/// the returned move list is empty and `success` is false.
pub fn plan_rearrangement(
    incoming_item: &Item,
    containers: &[Container],
    items: &[Item],
    current_placements: &[Placement],
    config: &PlannerConfig,
) -> RearrangementOutcome {
    let zone_containers: Vec<&Container> = containers.iter().filter(|c| c.zone == incoming_item.preferred_zone).collect();
    if zone_containers.is_empty() {
        return failure();
    }
    let zone_container_list: Vec<Container> = zone_containers.iter().map(|c| (*c).clone()).collect();

    let item_by_id = |id: &str| items.iter().find(|i| i.id == id);

    // Only items with a catalog entry are eviction candidates: a placement
    // whose item can't be resolved can't have its priority/dims looked up,
    // so it can never be relocated and must stay counted as occupying space.
    let mut zone_placements: Vec<(&Placement, &Item)> = current_placements
        .iter()
        .filter(|p| zone_container_list.iter().any(|c| c.id == p.container_id))
        .filter_map(|p| item_by_id(&p.item_id).map(|item| (p, item)))
        .collect();
    zone_placements.sort_by(|(pa, ia), (pb, ib)| ia.priority.cmp(&ib.priority).then_with(|| pa.item_id.cmp(&pb.item_id)));

    if zone_placements.is_empty() {
        return failure();
    }

    let mut target: Option<(BestCandidate, Vec<Evictee>)> = None;
    let mut percent = 10;
    while percent <= 100 {
        let n = ((zone_placements.len() as f64) * (percent as f64) / 100.0).ceil() as usize;
        let n = n.max(1).min(zone_placements.len());
        let evict_ids: Vec<&str> = zone_placements[..n].iter().map(|(p, _)| p.item_id.as_str()).collect();
        let reduced: Vec<Placement> = current_placements
            .iter()
            .filter(|p| !evict_ids.contains(&p.item_id.as_str()))
            .cloned()
            .collect();

        if let Some(best) = find_best_position(incoming_item, containers, &reduced, config) {
            let evictees: Vec<Evictee> = zone_placements[..n]
                .iter()
                .map(|(p, item)| Evictee { item, placement: (*p).clone() })
                .collect();
            target = Some((best, evictees));
            break;
        }
        percent += 10;
    }

    let Some((target_best, mut evictees)) = target else {
        return failure();
    };

    // ascending priority: the lowest-priority displaced item is relocated
    // (and if necessary, disturbed twice) before higher-priority ones.
    evictees.sort_by(|a, b| a.item.priority.cmp(&b.item.priority).then_with(|| a.item.id.cmp(&b.item.id)));

    let evicted_ids: Vec<&str> = evictees.iter().map(|e| e.item.id.as_str()).collect();
    let mut working: Vec<Placement> = current_placements
        .iter()
        .filter(|p| !evicted_ids.contains(&p.item_id.as_str()))
        .cloned()
        .collect();
    // Reserve the incoming item's target slot so relocated evictees can
    // never be routed back into the space this plan is freeing up.
    working.push(Placement {
        item_id: format!("__reserved:{}", incoming_item.id),
        container_id: target_best.container_id.clone(),
        orientation: target_best.orientation,
        min_corner: target_best.corner.as_tuple(),
        effective_dims: target_best.dims,
    });

    let mut moves = Vec::with_capacity(evictees.len());
    let mut relocated = Vec::with_capacity(evictees.len());
    let mut total_cost = 0.0;

    for evictee in &evictees {
        let from_container = evictee.placement.container_id.clone();
        let from_position = evictee.placement.min_corner;

        if let Some(best) = find_best_position(evictee.item, containers, &working, config) {
            let to_position = (best.corner.x, best.corner.y, best.corner.z);
            total_cost += move_cost(from_position, to_position, evictee.item.priority);
            moves.push(RearrangementMove {
                item_id: evictee.item.id.clone(),
                from_container: from_container.clone(),
                from_position,
                to_container: best.container_id.clone(),
                to_position,
                kind: MoveKind::Final,
            });
            let new_placement = Placement {
                item_id: evictee.item.id.clone(),
                container_id: best.container_id,
                orientation: best.orientation,
                min_corner: to_position,
                effective_dims: best.dims,
            };
            working.push(new_placement.clone());
            relocated.push(new_placement);
            continue;
        }

        match any_free_position(evictee.item.dims(), &zone_container_list, &working, config) {
            Some((container_id, orientation, corner, dims)) => {
                let to_position = corner.as_tuple();
                total_cost += move_cost(from_position, to_position, evictee.item.priority);
                moves.push(RearrangementMove {
                    item_id: evictee.item.id.clone(),
                    from_container,
                    from_position,
                    to_container: container_id.clone(),
                    to_position,
                    kind: MoveKind::Temporary,
                });
                let new_placement = Placement {
                    item_id: evictee.item.id.clone(),
                    container_id,
                    orientation,
                    min_corner: to_position,
                    effective_dims: dims,
                };
                working.push(new_placement.clone());
                relocated.push(new_placement);
            }
            None => {
                // No final and no temporary slot for this evictee anywhere
                // in the zone: the whole plan is infeasible.
                return failure();
            }
        }
    }

    if total_cost > config.rearrangement_cost_threshold {
        return failure();
    }

    moves.push(RearrangementMove {
        item_id: incoming_item.id.clone(),
        from_container: String::new(),
        from_position: (0.0, 0.0, 0.0),
        to_container: target_best.container_id.clone(),
        to_position: target_best.corner.as_tuple(),
        kind: MoveKind::Final,
    });
    let incoming_placement = Placement {
        item_id: incoming_item.id.clone(),
        container_id: target_best.container_id,
        orientation: target_best.orientation,
        min_corner: target_best.corner.as_tuple(),
        effective_dims: target_best.dims,
    };

    RearrangementOutcome {
        moves,
        relocated,
        incoming_placement: Some(incoming_placement),
        success: true,
    }
}
