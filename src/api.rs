//! HTTP surface for the stowage service.
//!
//! Provides the five endpoints of §6's external interface, an SSE batch
//! placement stream retained from the teacher's live-progress surface, and
//! an OpenAPI doc route and CORS, following the teacher's
//! `start_api_server` shape.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::{
    Router,
    http::StatusCode,
    response::{
        Html, IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::config::{ApiConfig, PlannerConfig};
use crate::csv_io::{self, LogEntry};
use crate::error::CoreError;
use crate::model::{Container, Item, WasteEntry};
use crate::planner::placement::{plan_placements, plan_single_placement};
use crate::planner::retrieval::{plan_retrieval, RetrievalAction, RetrievalStep};
use crate::planner::PlanEvent;
use crate::world::{normalize_item_id, World};

const ITEMS_CSV: &str = "items.csv";
const CONTAINERS_CSV: &str = "containers.csv";
const CARGO_ARRANGEMENT_CSV: &str = "cargo_arrangement.csv";
const WASTE_ITEMS_CSV: &str = "waste_items.csv";
const LOGS_CSV: &str = "logs.csv";

#[derive(Clone)]
pub struct ApiState {
    world: Arc<Mutex<World>>,
    planner_config: PlannerConfig,
}

impl ApiState {
    /// Builds API state around an already-populated world, bypassing CSV
    /// loading. Exposed so integration tests can drive the router without
    /// touching disk.
    pub fn new(world: World, planner_config: PlannerConfig) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
            planner_config,
        }
    }
}

fn persist_placements(world: &World) {
    let containers = world.container_list();
    let placements = world.placement_list();
    if let Err(err) = csv_io::write_cargo_arrangement(CARGO_ARRANGEMENT_CSV, &placements, &containers) {
        tracing::warn!(%err, "failed to persist cargo_arrangement.csv");
    }
}

fn persist_items(world: &World) {
    if let Err(err) = csv_io::write_items(ITEMS_CSV, &world.item_list()) {
        tracing::warn!(%err, "failed to persist items.csv");
    }
}

fn persist_waste(world: &World) {
    if let Err(err) = csv_io::write_waste(WASTE_ITEMS_CSV, &world.waste) {
        tracing::warn!(%err, "failed to persist waste_items.csv");
    }
}

fn record_log(action_type: &str, user_id: impl Into<String>, item_id: Option<String>, details: serde_json::Value, timestamp: Option<DateTime<Utc>>) {
    let entry = LogEntry {
        timestamp: timestamp.unwrap_or_else(Utc::now),
        user_id: user_id.into(),
        action_type: action_type.to_string(),
        item_id,
        details,
    };
    if let Err(err) = csv_io::append_log(LOGS_CSV, &entry) {
        tracing::warn!(%err, "failed to append log entry");
    }
}

#[derive(Serialize, ToSchema)]
struct SuccessResponse {
    success: bool,
}

impl SuccessResponse {
    fn new(success: bool) -> Self {
        Self { success }
    }
}

#[derive(Deserialize, ToSchema)]
struct PlaceRequest {
    #[serde(rename = "itemId")]
    item_id: String,
    #[serde(rename = "containerId")]
    container_id: String,
    position: (f64, f64, f64),
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Commits a single caller-supplied placement (§6: `POST /api/place`).
fn do_place(world: &mut World, payload: &PlaceRequest, config: &PlannerConfig) -> Result<(), CoreError> {
    let item_id = normalize_item_id(&payload.item_id)?;
    let item = world.item(&item_id)?.clone();
    let container = world.container(&payload.container_id)?.clone();
    let current_placements = world.placement_list();
    let placement = plan_single_placement(&item, &container, Some(payload.position), &current_placements, config)?;
    world.apply_placements(vec![placement]);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/place",
    request_body = PlaceRequest,
    responses((status = 200, description = "Placement attempted", body = SuccessResponse)),
    tag = "stowage"
)]
async fn handle_place(State(state): State<ApiState>, Json(payload): Json<PlaceRequest>) -> impl IntoResponse {
    let mut world = state.world.lock().await;
    let result = do_place(&mut world, &payload, &state.planner_config);
    let success = result.is_ok();
    if success {
        persist_placements(&world);
    } else if let Err(err) = &result {
        tracing::warn!(%err, item_id = %payload.item_id, "place request failed");
    }
    drop(world);

    record_log(
        "place",
        "",
        Some(payload.item_id.clone()),
        json!({ "containerId": payload.container_id, "position": payload.position }),
        payload.timestamp,
    );

    (StatusCode::OK, Json(SuccessResponse::new(success))).into_response()
}

#[derive(Deserialize, ToSchema)]
struct PlaceBatchRequest {
    #[serde(rename = "itemIds")]
    item_ids: Vec<String>,
}

/// Batch placement with live progress, kept from the teacher's streaming
/// `pack_objects_with_progress` surface (§7.1: ambient, not part of the
/// core contract). Events are buffered rather than truly interleaved with
/// computation, since the whole batch runs under the world lock.
#[utoipa::path(
    post,
    path = "/api/place/stream",
    request_body = PlaceBatchRequest,
    responses((status = 200, description = "Server-sent placement/unplaced events")),
    tag = "stowage"
)]
async fn handle_place_stream(
    State(state): State<ApiState>,
    Json(payload): Json<PlaceBatchRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut world = state.world.lock().await;
    let containers = world.container_list();
    let current_placements = world.placement_list();
    let items: Vec<Item> = payload
        .item_ids
        .iter()
        .filter_map(|raw| normalize_item_id(raw).ok())
        .filter_map(|id| world.item(&id).ok().cloned())
        .collect();

    let mut events = Vec::new();
    let outcome = plan_placements(&items, &containers, &current_placements, &state.planner_config, None, |event| {
        events.push(event.clone());
    });

    for relocation in outcome.relocated {
        world.move_placement(relocation);
    }
    world.apply_placements(outcome.new_placements);
    persist_placements(&world);
    drop(world);

    let sse_events: Vec<Result<Event, Infallible>> = events
        .into_iter()
        .map(|event: PlanEvent| Ok(Event::default().json_data(event).unwrap_or_else(|_| Event::default())))
        .collect();

    Sse::new(stream::iter(sse_events)).keep_alive(KeepAlive::default())
}

#[derive(Deserialize, ToSchema)]
struct RetrieveRequest {
    #[serde(rename = "itemId")]
    item_id: String,
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Consumes one use of an item and, if that exhausts it, docks it and routes
/// it to waste (mirrors the Python reference's usage-limit decrement).
fn do_retrieve(world: &mut World, item_id: &str) -> Result<u32, CoreError> {
    let placement = world
        .placements
        .get(item_id)
        .cloned()
        .ok_or_else(|| CoreError::not_found(format!("item {item_id} has no active placement")))?;
    let item = world.item(item_id)?.clone();
    if item.usage_limit == 0 {
        return Err(CoreError::no_fit(format!("item {item_id} has no uses left")));
    }
    let new_usage = item.usage_limit - 1;
    let mut updated = item.clone();
    updated.usage_limit = new_usage;
    world.register_item(updated);

    if new_usage == 0 {
        world.remove_placement(item_id);
        world.push_waste(WasteEntry {
            item_id: item_id.to_string(),
            name: item.name.clone(),
            reason: crate::model::WasteReason::OutOfUses,
            container_id: placement.container_id.clone(),
            position: placement.min_corner,
        });
    }
    Ok(new_usage)
}

#[utoipa::path(
    post,
    path = "/api/retrieve",
    request_body = RetrieveRequest,
    responses((status = 200, description = "Retrieval attempted", body = SuccessResponse)),
    tag = "stowage"
)]
async fn handle_retrieve(State(state): State<ApiState>, Json(payload): Json<RetrieveRequest>) -> impl IntoResponse {
    let mut world = state.world.lock().await;
    let item_id = match normalize_item_id(&payload.item_id) {
        Ok(id) => id,
        Err(_) => return (StatusCode::OK, Json(SuccessResponse::new(false))).into_response(),
    };
    let result = do_retrieve(&mut world, &item_id);
    let success = result.is_ok();
    if success {
        persist_items(&world);
        persist_placements(&world);
        persist_waste(&world);
    } else if let Err(err) = &result {
        tracing::warn!(%err, item_id = %item_id, "retrieve request failed");
    }
    drop(world);

    record_log(
        "retrieve",
        payload.user_id.clone(),
        Some(item_id),
        json!({ "newUsageLimit": result.ok() }),
        payload.timestamp,
    );

    (StatusCode::OK, Json(SuccessResponse::new(success))).into_response()
}

#[derive(Deserialize, ToSchema, IntoParams)]
struct SearchQuery {
    #[serde(rename = "itemId")]
    item_id: Option<String>,
    name: Option<String>,
    user_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct FoundItem {
    #[serde(rename = "itemId")]
    item_id: String,
    name: String,
    #[serde(rename = "containerId")]
    container_id: String,
    zone: String,
    position: (f64, f64, f64),
    #[serde(rename = "effectiveDims")]
    effective_dims: (f64, f64, f64),
}

#[derive(Serialize, ToSchema)]
struct SearchResponse {
    success: bool,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<FoundItem>,
    #[serde(rename = "retrievalSteps")]
    retrieval_steps: Vec<RetrievalStep>,
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses((status = 200, description = "Search result", body = SearchResponse)),
    tag = "stowage"
)]
async fn handle_search(State(state): State<ApiState>, Query(query): Query<SearchQuery>) -> impl IntoResponse {
    let world = state.world.lock().await;

    let resolved_id = query
        .item_id
        .as_deref()
        .and_then(|raw| normalize_item_id(raw).ok())
        .or_else(|| {
            query.name.as_deref().and_then(|name| {
                world.items.values().find(|item| item.name == name).map(|item| item.id.clone())
            })
        });

    let Some(item_id) = resolved_id else {
        return (StatusCode::OK, Json(SearchResponse { success: true, found: false, item: None, retrieval_steps: Vec::new() })).into_response();
    };

    let (Ok(item), Some(placement)) = (world.item(&item_id), world.placements.get(&item_id)) else {
        return (StatusCode::OK, Json(SearchResponse { success: true, found: false, item: None, retrieval_steps: Vec::new() })).into_response();
    };

    let zone = world.container(&placement.container_id).map(|c| c.zone.clone()).unwrap_or_default();
    let current_placements = world.placement_list();
    let all_items = world.item_list();
    let retrieval_steps = plan_retrieval(&item_id, &current_placements, &all_items)
        .map(|(steps, _)| steps)
        .unwrap_or_default();

    let response = SearchResponse {
        success: true,
        found: true,
        item: Some(FoundItem {
            item_id: item.id.clone(),
            name: item.name.clone(),
            container_id: placement.container_id.clone(),
            zone,
            position: placement.min_corner,
            effective_dims: placement.effective_dims,
        }),
        retrieval_steps,
    };
    drop(world);

    if let Some(user_id) = &query.user_id {
        record_log(
            "search",
            user_id.clone(),
            Some(item_id),
            json!({ "query": query.name.clone().or(query.item_id.clone()) }),
            None,
        );
    }

    (StatusCode::OK, Json(response)).into_response()
}

#[derive(Deserialize, ToSchema, IntoParams)]
struct LogsQuery {
    #[serde(rename = "startDate")]
    start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate")]
    end_date: Option<DateTime<Utc>>,
    #[serde(rename = "itemId")]
    item_id: Option<String>,
    user_id: Option<String>,
    action_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct LogsResponse {
    logs: Vec<LogEntry>,
}

#[utoipa::path(
    get,
    path = "/api/logs",
    params(LogsQuery),
    responses((status = 200, description = "Filtered log list", body = LogsResponse)),
    tag = "logs"
)]
async fn handle_get_logs(Query(query): Query<LogsQuery>) -> impl IntoResponse {
    let entries = match csv_io::read_logs(LOGS_CSV) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(%err, "failed to read logs.csv");
            Vec::new()
        }
    };

    let filtered: Vec<LogEntry> = entries
        .into_iter()
        .filter(|entry| query.start_date.is_none_or(|start| entry.timestamp >= start))
        .filter(|entry| query.end_date.is_none_or(|end| entry.timestamp <= end))
        .filter(|entry| query.item_id.as_deref().is_none_or(|id| entry.item_id.as_deref() == Some(id)))
        .filter(|entry| query.user_id.as_deref().is_none_or(|id| entry.user_id == id))
        .filter(|entry| query.action_type.as_deref().is_none_or(|t| entry.action_type == t))
        .collect();

    (StatusCode::OK, Json(LogsResponse { logs: filtered })).into_response()
}

#[derive(Deserialize, ToSchema)]
struct LogRequest {
    action_type: String,
    #[serde(rename = "itemId", default)]
    item_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

#[utoipa::path(
    post,
    path = "/api/logs",
    request_body = LogRequest,
    responses((status = 200, description = "Log entry appended", body = SuccessResponse)),
    tag = "logs"
)]
async fn handle_post_log(Json(payload): Json<LogRequest>) -> impl IntoResponse {
    record_log(
        &payload.action_type,
        payload.user_id.unwrap_or_default(),
        payload.item_id,
        payload.details.unwrap_or_else(|| json!({})),
        payload.timestamp,
    );
    (StatusCode::OK, Json(SuccessResponse::new(true))).into_response()
}

#[utoipa::path(
    post,
    path = "/api/clear",
    responses((status = 200, description = "Imported files and logs cleared", body = SuccessResponse)),
    tag = "logs"
)]
async fn handle_clear(State(state): State<ApiState>) -> impl IntoResponse {
    let mut world = state.world.lock().await;
    *world = World::new();
    drop(world);

    for path in [ITEMS_CSV, CONTAINERS_CSV, CARGO_ARRANGEMENT_CSV, WASTE_ITEMS_CSV] {
        if let Err(err) = csv_io::delete_if_exists(path) {
            tracing::warn!(%err, path, "failed to delete import file");
        }
    }
    if let Err(err) = csv_io::clear_logs(LOGS_CSV) {
        tracing::warn!(%err, "failed to clear logs.csv");
    }

    (StatusCode::OK, Json(SuccessResponse::new(true))).into_response()
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_place, handle_place_stream, handle_retrieve, handle_search, handle_get_logs, handle_post_log, handle_clear),
    components(
        schemas(
            PlaceRequest,
            PlaceBatchRequest,
            RetrieveRequest,
            SearchQuery,
            SearchResponse,
            FoundItem,
            RetrievalStep,
            RetrievalAction,
            LogsQuery,
            LogsResponse,
            LogEntry,
            LogRequest,
            SuccessResponse,
            Container,
            Item
        )
    ),
    tags((name = "stowage", description = "Placement, retrieval, and search"), (name = "logs", description = "Audit log access"))
)]
struct ApiDoc;

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stowage API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

async fn serve_openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// Wires every route onto `state`. Split out from `start_api_server` so
/// integration tests can exercise the router via `tower::ServiceExt::oneshot`
/// without binding a socket.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/api/place", post(handle_place))
        .route("/api/place/stream", post(handle_place_stream))
        .route("/api/retrieve", post(handle_retrieve))
        .route("/api/search", get(handle_search))
        .route("/api/logs", get(handle_get_logs).post(handle_post_log))
        .route("/api/clear", post(handle_clear))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server. Loads any existing `items.csv`/`containers.csv`/
/// `cargo_arrangement.csv`/`waste_items.csv` into the initial world snapshot.
pub async fn start_api_server(config: ApiConfig, planner_config: PlannerConfig) {
    let mut world = World::new();
    if let Ok(items) = csv_io::read_items(ITEMS_CSV) {
        for item in items {
            world.register_item(item);
        }
    }
    if let Ok(containers) = csv_io::read_containers(CONTAINERS_CSV) {
        for container in containers {
            world.register_container(container);
        }
    }
    if let Ok(placements) = csv_io::read_cargo_arrangement(CARGO_ARRANGEMENT_CSV, &world.item_list()) {
        world.apply_placements(placements);
    }
    if let Ok(waste) = csv_io::read_waste(WASTE_ITEMS_CSV) {
        world.waste = waste;
    }

    let state = ApiState::new(world, planner_config);
    let app = build_router(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("❌ Could not bind API server to {}: {}", addr, err);
        }
    };

    let display_host = config.display_host().to_string();
    println!("🚀 Server running on http://{}:{}", display_host, config.port());
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /api/place");
    println!("   - POST /api/place/stream (SSE)");
    println!("   - POST /api/retrieve");
    println!("   - GET  /api/search");
    println!("   - GET  /api/logs");
    println!("   - POST /api/logs");
    println!("   - POST /api/clear");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ API server terminated with an error: {err}");
    }
}
