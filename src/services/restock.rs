use crate::{
    config::{FailurePolicy, ForecastConfig},
    errors::ServiceError,
    ml::{encode_observations, Forecaster, RegressorSchema},
    models::{product_sort_key, AlertBatch, RestockAlert, SkipReason, SkippedProduct, StockSnapshot},
    services::{
        alerts::{self, AlertSubject},
        depletion,
        forecasting::{group_by_product, ForecastOrchestrator, ProductSeries},
        normalizer::{self, DroppedRows},
    },
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn, Span};

/// Outcome of evaluating a single product.
#[derive(Debug)]
struct ProductOutcome {
    product_id: String,
    product_name: String,
    result: Result<Option<RestockAlert>, ServiceError>,
}

/// Uploads parsed, encoded and split per product.
struct PreparedUpload {
    products: Vec<ProductSeries>,
    schema: Arc<RegressorSchema>,
    stock_index: HashMap<String, StockSnapshot>,
    dropped: DroppedRows,
}

/// Normalizes uploads, forecasts every product and collects restock alerts.
pub struct RestockPipeline {
    orchestrator: Arc<ForecastOrchestrator>,
    config: ForecastConfig,
    /// One permit per fit allowed to run on the blocking pool
    fit_slots: Arc<Semaphore>,
}

impl RestockPipeline {
    pub fn new(forecaster: Arc<dyn Forecaster>, config: ForecastConfig) -> Self {
        Self {
            orchestrator: Arc::new(ForecastOrchestrator::new(forecaster, config.clone())),
            fit_slots: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn forecaster_name(&self) -> &'static str {
        self.orchestrator.forecaster_name()
    }

    /// Runs the whole pipeline over the two CSV uploads.
    ///
    /// At most `max_concurrency` fits run at once across every run sharing
    /// this pipeline. A fit that outlives its timeout keeps its slot until it
    /// actually returns. The returned alerts and skips are ordered by product
    /// id regardless of completion order.
    #[instrument(skip_all, fields(forecaster = self.orchestrator.forecaster_name()))]
    pub async fn run(&self, historical: &str, stock: &str) -> Result<AlertBatch, ServiceError> {
        let started = Instant::now();
        counter!("restock.pipeline.runs", 1);

        let (historical, stock) = (historical.to_owned(), stock.to_owned());
        let span = Span::current();
        let PreparedUpload {
            products,
            schema,
            stock_index,
            dropped,
        } = tokio::task::spawn_blocking(move || span.in_scope(|| prepare(&historical, &stock)))
            .await
            .map_err(|err| {
                ServiceError::InternalError(format!("upload preparation task failed: {}", err))
            })??;

        if dropped.total() > 0 {
            warn!(
                unparseable_date = dropped.unparseable_date,
                blank_grouping_field = dropped.blank_grouping_field,
                "dropped unusable historical rows"
            );
        }

        let products_evaluated = products.len();
        info!(
            products = products_evaluated,
            regressors = schema.width(),
            "forecasting products"
        );

        let outcomes: Vec<ProductOutcome> = stream::iter(products)
            .map(|series| {
                let snapshot = stock_index.get(&series.product_id).cloned();
                self.evaluate(series, snapshot, schema.clone())
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut alerts = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(err) => {
                    let reason = self.skip_reason(&err)?;
                    if reason == SkipReason::PredictionFailed {
                        warn!(product_id = %outcome.product_id, error = %err, "forecast failed, skipping product");
                    }
                    skipped.push(SkippedProduct {
                        product_id: outcome.product_id,
                        product_name: outcome.product_name,
                        reason,
                        detail: Some(err.to_string()),
                    });
                }
            }
        }

        alerts.sort_by(|a, b| {
            product_sort_key(&a.product_id)
                .cmp(&product_sort_key(&b.product_id))
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        skipped.sort_by(|a, b| {
            product_sort_key(&a.product_id)
                .cmp(&product_sort_key(&b.product_id))
                .then_with(|| a.product_name.cmp(&b.product_name))
        });

        counter!("restock.products.skipped", skipped.len() as u64);
        counter!("restock.alerts.generated", alerts.len() as u64);
        histogram!(
            "restock.pipeline.duration_ms",
            started.elapsed().as_millis() as f64
        );
        info!(
            alerts = alerts.len(),
            skipped = skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "restock pipeline finished"
        );

        Ok(AlertBatch {
            alerts,
            skipped,
            products_evaluated,
            generated_at: Utc::now(),
        })
    }

    /// Maps a per-product failure onto a skip reason, or aborts the batch
    /// when the failure policy says so.
    fn skip_reason(&self, err: &ServiceError) -> Result<SkipReason, ServiceError> {
        match err {
            ServiceError::InsufficientData { .. } => Ok(SkipReason::InsufficientHistory),
            ServiceError::MissingStockSnapshot { .. } => Ok(SkipReason::MissingStockSnapshot),
            ServiceError::Timeout(_) => Ok(SkipReason::TimedOut),
            other => match self.config.failure_policy {
                FailurePolicy::Skip => Ok(SkipReason::PredictionFailed),
                FailurePolicy::Abort => Err(ServiceError::PredictionError(format!(
                    "Error predicting restock needs: {}",
                    other
                ))),
            },
        }
    }

    async fn evaluate(
        &self,
        series: ProductSeries,
        stock: Option<StockSnapshot>,
        schema: Arc<RegressorSchema>,
    ) -> ProductOutcome {
        let product_id = series.product_id.clone();
        let product_name = series.product_name.clone();
        let orchestrator = self.orchestrator.clone();

        let permit = match self.fit_slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                return ProductOutcome {
                    result: Err(ServiceError::InternalError(format!(
                        "no forecast slot for product {}: {}",
                        product_id, err
                    ))),
                    product_id,
                    product_name,
                }
            }
        };

        // The permit travels with the blocking work, so a timed-out fit
        // still holds its slot until it finishes
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            assess_product(&orchestrator, &series, stock.as_ref(), &schema)
        });

        let joined = match self.config.product_timeout() {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(product_id = %product_id, timeout_secs = limit.as_secs(), "forecast timed out");
                    return ProductOutcome {
                        result: Err(ServiceError::Timeout(format!(
                            "forecast for product {} exceeded {}s",
                            product_id,
                            limit.as_secs()
                        ))),
                        product_id,
                        product_name,
                    };
                }
            },
            None => task.await,
        };

        let result = joined.unwrap_or_else(|join_err| {
            Err(ServiceError::InternalError(format!(
                "forecast task for product {} failed: {}",
                product_id, join_err
            )))
        });

        ProductOutcome {
            product_id,
            product_name,
            result,
        }
    }
}

/// Parses, encodes and groups the uploads. CPU bound; run off the async workers.
fn prepare(historical: &str, stock: &str) -> Result<PreparedUpload, ServiceError> {
    let data = normalizer::normalize(historical, stock)?;
    let encoded = encode_observations(data.observations);
    let schema = Arc::new(encoded.schema.clone());
    Ok(PreparedUpload {
        products: group_by_product(encoded),
        schema,
        stock_index: index_stock(data.stock),
        dropped: data.dropped,
    })
}

/// First stock row per product wins.
fn index_stock(stock: Vec<StockSnapshot>) -> HashMap<String, StockSnapshot> {
    let mut index = HashMap::with_capacity(stock.len());
    for snapshot in stock {
        index.entry(snapshot.product_id.clone()).or_insert(snapshot);
    }
    index
}

/// Forecast, simulate and, if the product runs out, build its alert.
fn assess_product(
    orchestrator: &ForecastOrchestrator,
    series: &ProductSeries,
    stock: Option<&StockSnapshot>,
    schema: &RegressorSchema,
) -> Result<Option<RestockAlert>, ServiceError> {
    let forecast = orchestrator.forecast_product(series, stock, schema)?;
    let alert = depletion::simulate(&forecast.points, forecast.current_stock as f64).map(|stock_out| {
        alerts::synthesize(
            AlertSubject {
                product_id: &forecast.product_id,
                product_name: &forecast.product_name,
                current_stock: forecast.current_stock,
            },
            &stock_out,
            &series.demand(),
            orchestrator.config(),
        )
    });
    Ok(alert)
}
