//! Inventory Restock Predictor
//!
//! Forecasts per-product demand from uploaded sales history, simulates stock
//! depletion and serves restock alerts over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod ml;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, Router};
use http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    cache::{AlertStore, InMemoryAlertStore},
    config::AppConfig,
    ml::Forecaster,
    services::RestockPipeline,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<RestockPipeline>,
    pub alerts: Arc<dyn AlertStore>,
}

impl AppState {
    /// Builds state with an empty in-memory alert store.
    pub fn new(config: AppConfig, forecaster: Arc<dyn Forecaster>) -> Self {
        let pipeline = RestockPipeline::new(forecaster, config.forecast.clone());
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            alerts: Arc::new(InMemoryAlertStore::new()),
        }
    }
}

/// Builds the CORS layer from config
///
/// Explicit origins win; otherwise permissive in development or when
/// explicitly allowed. Anything else gets a layer that admits no origins.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        ::tracing::error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        CorsLayer::new()
    }
}

/// Full application router with middleware applied
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/api", handlers::api_routes())
        .merge(openapi::openapi_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

