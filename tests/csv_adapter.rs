//! End-to-end coverage of the CSV adapter: loads a world from a directory of
//! CSV files the way `start_api_server` does, runs a placement batch against
//! it, and confirms the persisted files read back to the same state.

use stowage::config::PlannerConfig;
use stowage::csv_io;
use stowage::model::{Container, Item, WasteEntry, WasteReason};
use stowage::planner::placement::plan_placements;
use stowage::world::World;

fn planner_config() -> PlannerConfig {
    PlannerConfig {
        epsilon: PlannerConfig::DEFAULT_EPSILON,
        small_item_ratio: PlannerConfig::DEFAULT_SMALL_ITEM_RATIO,
        fill_threshold: PlannerConfig::DEFAULT_FILL_THRESHOLD,
        rearrangement_cost_threshold: PlannerConfig::DEFAULT_REARRANGEMENT_COST_THRESHOLD,
        grid_cell_fraction: PlannerConfig::DEFAULT_GRID_CELL_FRACTION,
    }
}

#[test]
fn items_containers_and_arrangement_round_trip_through_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let items_path = dir.path().join("items.csv");
    let containers_path = dir.path().join("containers.csv");
    let arrangement_path = dir.path().join("cargo_arrangement.csv");

    let items = vec![
        Item::new("I1", "widget", 2.0, 3.0, 4.0, 1.0, 50, "Z", None, 1).unwrap(),
        Item::new("I2", "gadget", 2.0, 3.0, 4.0, 1.0, 40, "Z", None, 1).unwrap(),
    ];
    let containers = vec![Container::new("C1", "Z", 10.0, 10.0, 10.0).unwrap()];

    csv_io::write_items(&items_path, &items).unwrap();
    csv_io::write_containers(&containers_path, &containers).unwrap();

    let loaded_items = csv_io::read_items(&items_path).unwrap();
    let loaded_containers = csv_io::read_containers(&containers_path).unwrap();
    assert_eq!(loaded_items.len(), 2);
    assert_eq!(loaded_containers.len(), 1);

    let mut world = World::new();
    for item in loaded_items {
        world.register_item(item);
    }
    for container in loaded_containers {
        world.register_container(container);
    }

    let outcome = plan_placements(
        &world.item_list(),
        &world.container_list(),
        &[],
        &planner_config(),
        None,
        |_| {},
    );
    assert_eq!(outcome.new_placements.len(), 2, "both items fit in the 10x10x10 container");
    world.apply_placements(outcome.new_placements);

    csv_io::write_cargo_arrangement(&arrangement_path, &world.placement_list(), &world.container_list()).unwrap();

    let reloaded = csv_io::read_cargo_arrangement(&arrangement_path, &world.item_list()).unwrap();
    assert_eq!(reloaded.len(), 2);
    let i1 = reloaded.iter().find(|p| p.item_id == "I1").expect("I1 persisted");
    assert_eq!(i1.container_id, "C1");
    assert_eq!(i1.min_corner, (0.0, 0.0, 0.0));
}

#[test]
fn waste_and_logs_round_trip_through_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let waste_path = dir.path().join("waste_items.csv");
    let logs_path = dir.path().join("logs.csv");

    let waste = vec![WasteEntry {
        item_id: "I1".into(),
        name: "widget".into(),
        reason: WasteReason::OutOfUses,
        container_id: "C1".into(),
        position: (0.0, 0.0, 0.0),
    }];
    csv_io::write_waste(&waste_path, &waste).unwrap();
    let reloaded_waste = csv_io::read_waste(&waste_path).unwrap();
    assert_eq!(reloaded_waste.len(), 1);
    assert_eq!(reloaded_waste[0].reason, WasteReason::OutOfUses);

    let entry = csv_io::LogEntry {
        timestamp: chrono::Utc::now(),
        user_id: "tester".into(),
        action_type: "retrieve".into(),
        item_id: Some("I1".into()),
        details: serde_json::json!({ "newUsageLimit": 0 }),
    };
    csv_io::append_log(&logs_path, &entry).unwrap();
    csv_io::append_log(&logs_path, &entry).unwrap();
    let logs = csv_io::read_logs(&logs_path).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_type, "retrieve");
}
