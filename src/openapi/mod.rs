use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventory Restock Predictor API",
        version = "0.1.0",
        description = r#"
# Inventory Restock Predictor

Forecasts near-term demand per product from historical sales, simulates stock
depletion against current stock levels and reports products projected to run
out within the forecast horizon.

## Workflow

1. `POST /api/predict` with two CSV files as `multipart/form-data`:
   - `historical_data`: `date,product_id,product_name,region,season,month,holiday,quantity_sold`
   - `stock_data`: `product_id,current_stock`
2. `GET /api/alerts` returns the most recent batch until the next prediction replaces it.

## Error Handling

Errors share one body format:

```json
{
  "error": "Bad Request",
  "message": "Both historical_data and stock_data files are required",
  "request_id": "3f2a...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "restock", description = "Restock prediction endpoints"),
        (name = "inventory", description = "Inventory listing"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,
        crate::handlers::predict::predict_restock,
        crate::handlers::alerts::get_alerts,
        crate::handlers::inventory::get_inventory,
    ),
    components(
        schemas(
            crate::models::RestockAlert,
            crate::models::AlertStatus,
            crate::models::SkippedProduct,
            crate::models::SkipReason,
            crate::models::AlertBatch,
            crate::handlers::predict::PredictionResponse,
            crate::handlers::predict::PredictionUpload,
            crate::handlers::alerts::AlertsResponse,
            crate::handlers::inventory::InventoryResponse,
            crate::handlers::inventory::InventoryProduct,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ReadinessResponse,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
