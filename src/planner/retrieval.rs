//! Retrieval planner: given a target item, computes the ordered list of
//! items that must be moved aside to extract it through the open face
//! (y = 0).

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::geometry;
use crate::model::{Item, Placement};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalAction {
    MoveAside,
    Extract,
    Replace,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RetrievalStep {
    pub step: u32,
    pub action: RetrievalAction,
    pub item_id: String,
    pub item_name: String,
}

/// True iff `blocker` sits between `target` and the open face (y = 0) and
/// shares x/z extents with it — the narrower-than-"any neighbor" predicate
/// the design notes call for.
pub fn blocks(blocker_bounds: &geometry::Aabb, target_bounds: &geometry::Aabb) -> bool {
    blocker_bounds.max.y <= target_bounds.min.y + geometry::EPSILON
        && geometry::xz_extents_overlap(blocker_bounds, target_bounds)
}

/// Computes the blockers of `target_id` and sequences move-aside/extract/
/// replace. Read-only: does not mutate `current_placements`.
pub fn plan_retrieval(
    target_id: &str,
    current_placements: &[Placement],
    items: &[Item],
) -> Result<(Vec<RetrievalStep>, bool), CoreError> {
    let target = current_placements
        .iter()
        .find(|p| p.item_id == target_id)
        .ok_or_else(|| CoreError::not_found(format!("item {target_id} has no active placement")))?;

    let target_container = &target.container_id;
    let target_bounds = target.bounds();

    let name_of = |id: &str| -> String {
        items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.name.clone())
            .unwrap_or_default()
    };
    let priority_of = |id: &str| -> u8 { items.iter().find(|i| i.id == id).map(|i| i.priority).unwrap_or(0) };

    let mut blockers: Vec<&Placement> = current_placements
        .iter()
        .filter(|p| p.item_id != target_id && &p.container_id == target_container)
        .filter(|p| blocks(&p.bounds(), &target_bounds))
        .collect();

    // Descending y_max (closest to the open face first), tie-break
    // descending z_max, then ascending priority.
    blockers.sort_by(|a, b| {
        let ab = a.bounds();
        let bb = b.bounds();
        bb.max
            .y
            .partial_cmp(&ab.max.y)
            .unwrap()
            .then_with(|| bb.max.z.partial_cmp(&ab.max.z).unwrap())
            .then_with(|| priority_of(&a.item_id).cmp(&priority_of(&b.item_id)))
    });

    let mut steps = Vec::with_capacity(blockers.len() * 2 + 1);
    let mut step_no = 1;
    for b in &blockers {
        steps.push(RetrievalStep {
            step: step_no,
            action: RetrievalAction::MoveAside,
            item_id: b.item_id.clone(),
            item_name: name_of(&b.item_id),
        });
        step_no += 1;
    }
    steps.push(RetrievalStep {
        step: step_no,
        action: RetrievalAction::Extract,
        item_id: target.item_id.clone(),
        item_name: name_of(&target.item_id),
    });
    step_no += 1;
    for b in blockers.iter().rev() {
        steps.push(RetrievalStep {
            step: step_no,
            action: RetrievalAction::Replace,
            item_id: b.item_id.clone(),
            item_name: name_of(&b.item_id),
        });
        step_no += 1;
    }

    Ok((steps, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;

    fn placement(item_id: &str, container: &str, corner: (f64, f64, f64), dims: (f64, f64, f64)) -> Placement {
        Placement {
            item_id: item_id.into(),
            container_id: container.into(),
            orientation: Orientation::Wdh,
            min_corner: corner,
            effective_dims: dims,
        }
    }

    #[test]
    fn scenario_5_single_blocker() {
        let t = placement("T", "C1", (0.0, 3.0, 0.0), (2.0, 2.0, 2.0));
        let b = placement("B", "C1", (0.0, 0.0, 0.0), (2.0, 2.0, 2.0));
        let items = vec![];
        let (steps, success) = plan_retrieval("T", &[t, b], &items).unwrap();
        assert!(success);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].action, RetrievalAction::MoveAside);
        assert_eq!(steps[0].item_id, "B");
        assert_eq!(steps[1].action, RetrievalAction::Extract);
        assert_eq!(steps[1].item_id, "T");
        assert_eq!(steps[2].action, RetrievalAction::Replace);
        assert_eq!(steps[2].item_id, "B");
    }

    #[test]
    fn missing_target_is_not_found() {
        let items = vec![];
        let err = plan_retrieval("ghost", &[], &items).unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[test]
    fn non_blocking_neighbor_is_excluded() {
        // Same x/z extents but sitting *beyond* the target (higher y), so it
        // is not between the target and the open face.
        let t = placement("T", "C1", (0.0, 0.0, 0.0), (2.0, 2.0, 2.0));
        let not_blocker = placement("N", "C1", (0.0, 2.0, 0.0), (2.0, 2.0, 2.0));
        let items = vec![];
        let (steps, _) = plan_retrieval("T", &[t, not_blocker], &items).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, RetrievalAction::Extract);
    }

    #[test]
    fn replace_multiset_equals_move_aside_multiset() {
        let t = placement("T", "C1", (0.0, 4.0, 0.0), (2.0, 2.0, 2.0));
        let b1 = placement("B1", "C1", (0.0, 0.0, 0.0), (2.0, 2.0, 2.0));
        let b2 = placement("B2", "C1", (0.0, 2.0, 0.0), (2.0, 2.0, 2.0));
        let items = vec![];
        let (steps, _) = plan_retrieval("T", &[t, b1, b2], &items).unwrap();
        let move_aside: Vec<&str> = steps
            .iter()
            .filter(|s| s.action == RetrievalAction::MoveAside)
            .map(|s| s.item_id.as_str())
            .collect();
        let replace: Vec<&str> = steps
            .iter()
            .filter(|s| s.action == RetrievalAction::Replace)
            .map(|s| s.item_id.as_str())
            .collect();
        let mut a = move_aside.clone();
        let mut b = replace.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        // closest to the open face (lower y) must be replaced last.
        assert_eq!(replace.last(), Some(&"B1"));
    }
}
