//! Waste/usage bookkeeping contract (§4.G): declarative rules the adapter
//! consumes from the world snapshot. The core does not mutate usage
//! counters or remove placements itself — it only classifies.

use chrono::{DateTime, Utc};

use crate::model::{Item, Placement, WasteEntry, WasteReason};

/// An item becomes waste iff `expiry_date <= clock` or `usage_limit == 0`
/// (spec.md §6/§8 P8). Items without an active placement are skipped: waste
/// entries require a container/position to record.
pub fn classify_waste(items: &[Item], placements: &[Placement], clock: DateTime<Utc>) -> Vec<WasteEntry> {
    let mut out = Vec::new();
    for item in items {
        let reason = if item.usage_limit == 0 {
            Some(WasteReason::OutOfUses)
        } else if item.expiry_date.is_some_and(|expiry| expiry <= clock) {
            Some(WasteReason::Expired)
        } else {
            None
        };
        let Some(reason) = reason else { continue };
        let Some(placement) = placements.iter().find(|p| p.item_id == item.id) else {
            continue;
        };
        out.push(WasteEntry {
            item_id: item.id.clone(),
            name: item.name.clone(),
            reason,
            container_id: placement.container_id.clone(),
            position: placement.min_corner,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;
    use chrono::Duration;

    fn placement(item_id: &str) -> Placement {
        Placement {
            item_id: item_id.into(),
            container_id: "C1".into(),
            orientation: Orientation::Wdh,
            min_corner: (0.0, 0.0, 0.0),
            effective_dims: (1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn scenario_6_waste_classification() {
        let clock = Utc::now();
        let e = Item::new("E", "expired", 1.0, 1.0, 1.0, 1.0, 50, "Z", Some(clock), 3).unwrap();
        let u = Item::new("U", "exhausted", 1.0, 1.0, 1.0, 1.0, 50, "Z", None, 0).unwrap();
        let ok = Item::new("OK", "fine", 1.0, 1.0, 1.0, 1.0, 50, "Z", Some(clock + Duration::days(1)), 3).unwrap();

        let placements = vec![placement("E"), placement("U"), placement("OK")];
        let waste = classify_waste(&[e, u, ok], &placements, clock);

        let ids: Vec<&str> = waste.iter().map(|w| w.item_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"E"));
        assert!(ids.contains(&"U"));
    }

    #[test]
    fn zero_usage_takes_precedence_over_unexpired() {
        let clock = Utc::now();
        let item = Item::new("Z1", "z", 1.0, 1.0, 1.0, 1.0, 50, "Z", Some(clock + Duration::days(5)), 0).unwrap();
        let waste = classify_waste(&[item], &[placement("Z1")], clock);
        assert_eq!(waste.len(), 1);
        assert_eq!(waste[0].reason, WasteReason::OutOfUses);
    }

    #[test]
    fn unplaced_expired_item_yields_no_entry() {
        let clock = Utc::now();
        let item = Item::new("X", "x", 1.0, 1.0, 1.0, 1.0, 50, "Z", Some(clock), 3).unwrap();
        let waste = classify_waste(&[item], &[], clock);
        assert!(waste.is_empty());
    }
}
