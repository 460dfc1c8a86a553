//! End-to-end coverage of the HTTP adapter: drives the real axum router
//! (built the same way `start_api_server` builds it) through
//! `tower::ServiceExt::oneshot`, without binding a socket.

use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use stowage::api::{build_router, ApiState};
use stowage::config::PlannerConfig;
use stowage::model::{Container, Item};
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

fn seeded_world() -> World {
    let mut world = World::new();
    world.register_container(Container::new("C1", "Z", 10.0, 10.0, 10.0).unwrap());
    world.register_item(Item::new("1", "widget", 2.0, 2.0, 2.0, 1.0, 50, "Z", None, 3).unwrap());
    world
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Handlers persist CSVs relative to the process's current directory, which
/// is global process state — so every scenario that exercises them runs
/// sequentially inside this one `#[tokio::test]` rather than as sibling
/// tests that could race each other's `set_current_dir`.
#[tokio::test]
async fn http_adapter_end_to_end() {
    let original_dir = std::env::current_dir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    std::env::set_current_dir(scratch.path()).unwrap();

    place_retrieve_and_search_round_trip().await;
    place_with_no_fit_reports_failure_without_persisting().await;

    std::env::set_current_dir(original_dir).unwrap();
}

async fn place_retrieve_and_search_round_trip() {
    let state = ApiState::new(seeded_world(), planner_config());
    let app = build_router(state);

    let place_request = Request::builder()
        .method("POST")
        .uri("/api/place")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "itemId": "1", "containerId": "C1", "position": [0.0, 0.0, 0.0] }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(place_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));

    // The handler must have persisted the new arrangement to disk (§6's CSV
    // interchange contract), readable back through the same adapter.
    let persisted = stowage::csv_io::read_cargo_arrangement("cargo_arrangement.csv", &[Item::new("1", "widget", 2.0, 2.0, 2.0, 1.0, 50, "Z", None, 3).unwrap()]).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].container_id, "C1");

    let search_request = Request::builder()
        .method("GET")
        .uri("/api/search?itemId=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(search_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["found"], json!(true));
    assert_eq!(body["item"]["containerId"], json!("C1"));

    let retrieve_request = Request::builder()
        .method("POST")
        .uri("/api/retrieve")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "itemId": "1", "userId": "tester" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(retrieve_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));

    // Usage limit went from 3 to 2: the item is still findable, not waste.
    let search_again = Request::builder()
        .method("GET")
        .uri("/api/search?itemId=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(search_again).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["found"], json!(true));

    let logs_request = Request::builder().method("GET").uri("/api/logs").body(Body::empty()).unwrap();
    let response = app.oneshot(logs_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body["logs"].as_array().expect("logs is an array");
    assert!(entries.iter().any(|e| e["action_type"] == json!("place")));
    assert!(entries.iter().any(|e| e["action_type"] == json!("retrieve")));
}

async fn place_with_no_fit_reports_failure_without_persisting() {
    let mut world = World::new();
    world.register_container(Container::new("C1", "Z", 1.0, 1.0, 1.0).unwrap());
    world.register_item(Item::new("99", "too big", 5.0, 5.0, 5.0, 1.0, 50, "Z", None, 1).unwrap());
    let state = ApiState::new(world, planner_config());
    let app = build_router(state);

    let place_request = Request::builder()
        .method("POST")
        .uri("/api/place")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "itemId": "99", "containerId": "C1", "position": [0.0, 0.0, 0.0] }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(place_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}
