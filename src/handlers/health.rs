use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use utoipa::ToSchema;

use crate::AppState;

const HEALTH_MESSAGE: &str = "Inventory Restock Predictor API is running";

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "Inventory Restock Predictor API is running")]
    pub message: String,
}

/// Readiness response with cache and model details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub forecaster: String,
    pub alerts_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: HEALTH_MESSAGE.to_string(),
    })
}

/// Readiness probe: reports whether a batch is cached and which forecaster is loaded
#[utoipa::path(
    get,
    path = "/api/health/ready",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse)
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let latest = state.alerts.latest().await;
    Json(ReadinessResponse {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime_secs(),
        forecaster: state.pipeline.forecaster_name().to_string(),
        alerts_cached: latest.is_some(),
        last_updated: latest.map(|batch| batch.generated_at),
    })
}

/// Creates the router for health check endpoints
///
/// Endpoints:
/// - GET /health         - Liveness probe
/// - GET /health/ready   - Readiness probe
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}
