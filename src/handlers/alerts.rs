use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{RestockAlert, SkippedProduct},
    AppState,
};

const NO_ALERTS_MESSAGE: &str = "No alerts available. Please upload data first.";

/// Latest cached alerts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertsResponse {
    pub alerts: Vec<RestockAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedProduct>,
    /// Set only when no prediction has run yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Read the most recent alert batch
#[utoipa::path(
    get,
    path = "/api/alerts",
    responses(
        (status = 200, description = "Latest alerts, or an empty list before the first prediction", body = AlertsResponse)
    ),
    tag = "restock"
)]
pub async fn get_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    let response = match state.alerts.latest().await {
        Some(batch) => AlertsResponse {
            alerts: batch.alerts.clone(),
            last_updated: Some(batch.generated_at),
            skipped: batch.skipped.clone(),
            message: None,
        },
        None => AlertsResponse {
            alerts: Vec::new(),
            last_updated: None,
            skipped: Vec::new(),
            message: Some(NO_ALERTS_MESSAGE.to_string()),
        },
    };
    Json(response)
}
