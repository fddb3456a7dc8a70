use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Data format error: historical data is missing required column(s): holiday",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Internal Server Error")
    #[schema(example = "Bad Request")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Diagnostic detail, only populated when the service is configured to expose it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Data format error: {0}")]
    DataFormatError(String),

    #[error("Insufficient data for product {product_id}: {actual} point(s), at least {required} required")]
    InsufficientData {
        product_id: String,
        required: usize,
        actual: usize,
    },

    #[error("No stock snapshot for product {product_id}")]
    MissingStockSnapshot { product_id: String },

    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        ServiceError::DataFormatError(format!("input could not be parsed as CSV: {}", err))
    }
}

impl From<crate::ml::forecasting::ForecastError> for ServiceError {
    fn from(err: crate::ml::forecasting::ForecastError) -> Self {
        ServiceError::PredictionError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DataFormatError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            // Per-product conditions normally never reach the boundary
            Self::InsufficientData { .. }
            | Self::MissingStockSnapshot { .. }
            | Self::PredictionError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Attaches diagnostic detail to the error when `expose` is set.
    pub fn diagnosed(self, expose: bool) -> ApiError {
        if expose {
            let details = format!("{:#?}", self);
            ApiError::Diagnosed {
                error: self,
                details,
            }
        } else {
            ApiError::Service(self)
        }
    }
}

fn error_body(status: StatusCode, message: String, details: Option<String>) -> ErrorResponse {
    ErrorResponse {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message,
        details,
        request_id: current_request_id(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = error_body(status, self.response_message(), None);
        (status, Json(body)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{error}")]
    Diagnosed { error: ServiceError, details: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(error) => error.into_response(),
            ApiError::Diagnosed { error, details } => {
                let status = error.status_code();
                // Diagnosed errors carry the full message even for internal failures
                let body = error_body(status, error.to_string(), Some(details));
                (status, Json(body)).into_response()
            }
        }
    }
}
