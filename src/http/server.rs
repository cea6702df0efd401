//! HTTP API Server for quakeswarm
//!
//! Read endpoints answer from the live view snapshot; `POST /api/rebuild`
//! reloads the catalog and swaps a new view in when the build completes.

use crate::{
    api::SwarmService,
    association::Swarm,
    catalog::{ingest::parse_timestamp, load_catalog},
    clustering::Cluster,
    config::SwarmConfig,
    core::TimeRange,
    error::SwarmError,
    view::{RebuildSummary, SwarmMember},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Query string of `GET /api/swarms/near`
#[derive(Debug, Deserialize)]
pub struct NearQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    /// RFC 3339 or epoch milliseconds; unbounded when absent
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Swarm together with its per-member rows
#[derive(Debug, Serialize)]
pub struct SwarmDetailResponse {
    pub swarm: Swarm,
    pub members: Vec<SwarmMember>,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared application state
pub struct AppState {
    pub service: SwarmService,
    /// The only catalog `POST /api/rebuild` reads; fixed at startup
    pub catalog_path: Option<PathBuf>,
    pub config: SwarmConfig,
}

/// Custom error type for API errors
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<SwarmError> for ApiError {
    fn from(err: SwarmError) -> Self {
        let message = err.to_string();
        match err {
            SwarmError::NotFound(_) => ApiError::NotFound(message),
            SwarmError::Busy | SwarmError::Cancelled => ApiError::Conflict(message),
            SwarmError::Validation { .. } | SwarmError::Config(_) | SwarmError::Parse(_) => {
                ApiError::BadRequest(message)
            }
            SwarmError::Io(_) | SwarmError::Serialization(_) => ApiError::InternalError(message),
        }
    }
}

/// Create the HTTP server with all routes
pub fn create_server(service: SwarmService, catalog_path: Option<PathBuf>, config: SwarmConfig) -> Router {
    let state = Arc::new(AppState { service, catalog_path, config });

    // Configure CORS
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/summary", get(summary))
        .route("/api/mainshocks/:id/swarms", get(swarms_for_mainshock))
        .route("/api/events/:id/cluster", get(cluster_for_event))
        .route("/api/swarms/near", get(swarms_near))
        .route("/api/swarms/:id", get(swarm_detail))
        .route("/api/clusters/unclassified", get(unclassified_clusters))
        .route("/api/rebuild", post(rebuild))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(SuccessResponse { message: "quakeswarm HTTP API is running".to_string() })
}

/// GET /api/summary - Counts from the last completed rebuild
async fn summary(State(state): State<Arc<AppState>>) -> Json<RebuildSummary> {
    Json(state.service.query().rebuild_summary())
}

/// GET /api/mainshocks/:id/swarms - Swarms of a mainshock, by lead time
async fn swarms_for_mainshock(
    State(state): State<Arc<AppState>>,
    Path(mainshock_id): Path<String>,
) -> Json<Vec<Swarm>> {
    Json(state.service.query().swarms_for_mainshock(&mainshock_id))
}

/// GET /api/events/:id/cluster - Cluster holding an event
async fn cluster_for_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<Cluster>, ApiError> {
    Ok(Json(state.service.query().cluster_for_event(&event_id)?))
}

/// GET /api/swarms/near - Swarms around a point within a time range
async fn swarms_near(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearQuery>,
) -> Result<Json<Vec<Swarm>>, ApiError> {
    if !(params.radius_km.is_finite() && params.radius_km >= 0.0) {
        return Err(ApiError::BadRequest(format!("invalid radius_km {}", params.radius_km)));
    }
    let start = parse_bound(params.start.as_deref(), i64::MIN)?;
    let end = parse_bound(params.end.as_deref(), i64::MAX)?;

    let swarms =
        state.service.query().swarms_near(params.lat, params.lon, params.radius_km, TimeRange::new(start, end));
    Ok(Json(swarms))
}

fn parse_bound(text: Option<&str>, unbounded: i64) -> Result<i64, ApiError> {
    match text {
        None => Ok(unbounded),
        Some(text) => {
            parse_timestamp(text).ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp '{}'", text)))
        }
    }
}

/// GET /api/swarms/:id - One swarm with member details
async fn swarm_detail(
    State(state): State<Arc<AppState>>,
    Path(swarm_id): Path<u32>,
) -> Result<Json<SwarmDetailResponse>, ApiError> {
    let engine = state.service.query();
    let swarm = engine.swarm(swarm_id)?;
    let members = engine.swarm_members(swarm_id)?;
    Ok(Json(SwarmDetailResponse { swarm, members }))
}

/// GET /api/clusters/unclassified - Clusters no mainshock claimed
async fn unclassified_clusters(State(state): State<Arc<AppState>>) -> Json<Vec<Cluster>> {
    Json(state.service.query().unclassified_clusters())
}

/// POST /api/rebuild - Reload the configured catalog and publish a new view
///
/// Request bodies are ignored; clients cannot point the server at another file.
async fn rebuild(State(state): State<Arc<AppState>>) -> Result<Json<RebuildSummary>, ApiError> {
    let path = state
        .catalog_path
        .clone()
        .ok_or_else(|| ApiError::BadRequest("no catalog path configured".to_string()))?;

    // Reserve the slot before any work so a concurrent request sees 409 at once.
    let ticket = state.service.begin_rebuild()?;
    let config = state.config.clone();

    let summary = tokio::task::spawn_blocking(move || {
        let catalog = load_catalog(&path)?;
        ticket.run(&catalog, &config)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("rebuild task failed: {}", e)))??;

    Ok(Json(summary))
}

/// Start the HTTP server
pub async fn start_server(
    addr: &str,
    service: SwarmService,
    catalog_path: Option<PathBuf>,
    config: SwarmConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(service, catalog_path, config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("quakeswarm HTTP API listening on http://{}", addr);
    info!("  GET    /health                     - Health check");
    info!("  GET    /api/summary                - Last rebuild summary");
    info!("  GET    /api/mainshocks/:id/swarms  - Swarms of a mainshock");
    info!("  GET    /api/events/:id/cluster     - Cluster of an event");
    info!("  GET    /api/swarms/near            - Swarms near a point");
    info!("  GET    /api/swarms/:id             - Swarm with member details");
    info!("  GET    /api/clusters/unclassified  - Unclaimed clusters");
    info!("  POST   /api/rebuild                - Rebuild the view");

    axum::serve(listener, app).await?;

    Ok(())
}
