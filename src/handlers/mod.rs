pub mod alerts;
pub mod health;
pub mod inventory;
pub mod predict;

use axum::{
    routing::{get, post},
    Router,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::health_routes())
        .route("/predict", post(predict::predict_restock))
        .route("/alerts", get(alerts::get_alerts))
        .route("/inventory", get(inventory::get_inventory))
}
