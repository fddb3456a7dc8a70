#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::NaiveDate;
use restock_predictor::{
    config::AppConfig,
    ml::{ForecastError, Forecaster, FutureContext, Prediction, SeriesPoint, TrainedModel},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "restock-test-boundary";

pub const HISTORICAL_HEADER: &str =
    "date,product_id,product_name,region,season,month,holiday,quantity_sold";

/// Two days of flat demand for product P with 8 units on hand.
pub const SCENARIO_A_HISTORY: &str = "date,product_id,product_name,region,season,month,holiday,quantity_sold\n\
2024-01-01,P,Widget,North,Winter,January,No,5\n\
2024-01-02,P,Widget,North,Winter,January,No,5\n";
pub const SCENARIO_A_STOCK: &str = "product_id,current_stock\nP,8\n";

/// Deterministic forecaster: every future period gets the mean of the history.
#[derive(Debug, Default)]
pub struct MeanForecaster;

struct MeanModel {
    level: f64,
    width: usize,
    last: NaiveDate,
}

impl Forecaster for MeanForecaster {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn fit(&self, series: &[SeriesPoint]) -> Result<Box<dyn TrainedModel>, ForecastError> {
        if series.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: series.len(),
            });
        }
        let level = series.iter().map(|p| p.y).sum::<f64>() / series.len() as f64;
        Ok(Box::new(MeanModel {
            level,
            width: series[0].regressors.len(),
            last: series.iter().map(|p| p.ds).max().unwrap(),
        }))
    }
}

impl TrainedModel for MeanModel {
    fn regressor_width(&self) -> usize {
        self.width
    }

    fn last_observed(&self) -> NaiveDate {
        self.last
    }

    fn predict(&self, future: &[FutureContext]) -> Result<Vec<Prediction>, ForecastError> {
        Ok(future
            .iter()
            .map(|ctx| Prediction {
                ds: ctx.ds,
                yhat: self.level,
            })
            .collect())
    }
}

/// Forecaster that always fails to fit.
#[derive(Debug, Default)]
pub struct FailingForecaster;

impl Forecaster for FailingForecaster {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fit(&self, _series: &[SeriesPoint]) -> Result<Box<dyn TrainedModel>, ForecastError> {
        Err(ForecastError::Singular)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::new("127.0.0.1".to_string(), 5000, "development".to_string())
}

/// Helper harness around the full application router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_forecaster(test_config(), Arc::new(MeanForecaster))
    }

    pub fn with_forecaster(config: AppConfig, forecaster: Arc<dyn Forecaster>) -> Self {
        let state = AppState::new(config, forecaster);
        let router = restock_predictor::app(state.clone());
        Self { router, state }
    }

    pub async fn request(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.request(request).await
    }

    /// Posts the given `(field, csv)` parts to `/api/predict`.
    pub async fn predict(&self, parts: &[(&str, &str)]) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("failed to build request");
        self.request(request).await
    }
}

/// Builds a multipart body with one file part per `(field, content)`.
pub fn multipart_body(parts: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (field, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{field}.csv\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not json")
}
