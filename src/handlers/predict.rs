use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    errors::{ApiError, ServiceError},
    models::{RestockAlert, SkippedProduct},
    AppState,
};

pub const HISTORICAL_FIELD: &str = "historical_data";
pub const STOCK_FIELD: &str = "stock_data";

const MISSING_FILES_MESSAGE: &str = "Both historical_data and stock_data files are required";

/// Result of a prediction run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionResponse {
    #[schema(example = "Prediction completed successfully")]
    pub message: String,
    pub alerts: Vec<RestockAlert>,
    pub count: usize,
    pub skipped: Vec<SkippedProduct>,
    pub products_evaluated: usize,
    pub generated_at: DateTime<Utc>,
}

/// Upload form: two CSV files
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PredictionUpload {
    /// Historical sales CSV
    #[schema(value_type = String, format = Binary)]
    historical_data: Vec<u8>,
    /// Current stock CSV
    #[schema(value_type = String, format = Binary)]
    stock_data: Vec<u8>,
}

#[derive(Default)]
struct Uploads {
    historical: Option<String>,
    stock: Option<String>,
}

/// Run the restock pipeline over uploaded CSV files
#[utoipa::path(
    post,
    path = "/api/predict",
    request_body(content = PredictionUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Prediction completed", body = PredictionResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Missing file or malformed CSV", body = crate::errors::ErrorResponse),
        (status = 413, description = "Upload too large", body = crate::errors::ErrorResponse),
        (status = 500, description = "Prediction failed", body = crate::errors::ErrorResponse)
    ),
    tag = "restock"
)]
#[instrument(skip_all)]
pub async fn predict_restock(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let expose = state.config.expose_error_details();

    let multipart = multipart.map_err(|rejection| {
        ServiceError::BadRequest(format!("{}: {}", MISSING_FILES_MESSAGE, rejection.body_text()))
            .diagnosed(expose)
    })?;
    let uploads = read_uploads(multipart).await.map_err(|e| e.diagnosed(expose))?;

    let (Some(historical), Some(stock)) = (uploads.historical, uploads.stock) else {
        return Err(ServiceError::BadRequest(MISSING_FILES_MESSAGE.to_string()).diagnosed(expose));
    };

    let batch = state
        .pipeline
        .run(&historical, &stock)
        .await
        .map_err(|e| e.diagnosed(expose))?;
    let batch = state.alerts.replace(batch).await;

    info!(
        alerts = batch.len(),
        skipped = batch.skipped.len(),
        "stored new alert batch"
    );

    Ok(Json(PredictionResponse {
        message: "Prediction completed successfully".to_string(),
        count: batch.alerts.len(),
        alerts: batch.alerts.clone(),
        skipped: batch.skipped.clone(),
        products_evaluated: batch.products_evaluated,
        generated_at: batch.generated_at,
    }))
}

async fn read_uploads(mut multipart: Multipart) -> Result<Uploads, ServiceError> {
    let mut uploads = Uploads::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != HISTORICAL_FIELD && name != STOCK_FIELD {
            continue;
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
            ServiceError::DataFormatError(format!("{} is not valid UTF-8 text", name))
        })?;
        if name == HISTORICAL_FIELD {
            uploads.historical = Some(text);
        } else {
            uploads.stock = Some(text);
        }
    }
    Ok(uploads)
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(err.body_text())
    } else {
        ServiceError::BadRequest(err.body_text())
    }
}
