use crate::{
    config::ForecastConfig,
    errors::ServiceError,
    ml::{
        calendar, EncodedObservations, ForecastError, Forecaster, FutureContext,
        RegressorSchema, SeriesPoint, TrainedModel,
    },
    models::{ForecastPoint, FuturePeriod, HistoricalObservation, ObservationContext, StockSnapshot},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// One product's encoded history, in date order.
#[derive(Debug, Clone)]
pub struct ProductSeries {
    pub product_id: String,
    pub product_name: String,
    pub observations: Vec<HistoricalObservation>,
    /// Regressor rows aligned with `observations`
    pub features: Vec<Vec<f64>>,
}

impl ProductSeries {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observed demand in date order.
    pub fn demand(&self) -> Vec<f64> {
        self.observations.iter().map(|obs| obs.quantity_sold).collect()
    }

    fn to_series_points(&self) -> Vec<SeriesPoint> {
        self.observations
            .iter()
            .zip(&self.features)
            .map(|(obs, regressors)| SeriesPoint {
                ds: obs.date,
                y: obs.quantity_sold,
                regressors: regressors.clone(),
            })
            .collect()
    }
}

/// Splits the encoded set into one series per `(product_id, product_name)`,
/// in order of first appearance.
pub fn group_by_product(encoded: EncodedObservations) -> Vec<ProductSeries> {
    let mut products: Vec<ProductSeries> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for (observation, features) in encoded.observations.into_iter().zip(encoded.features) {
        let key = (
            observation.product_id.clone(),
            observation.product_name.clone(),
        );
        let position = *index.entry(key).or_insert_with(|| {
            products.push(ProductSeries {
                product_id: observation.product_id.clone(),
                product_name: observation.product_name.clone(),
                observations: Vec::new(),
                features: Vec::new(),
            });
            products.len() - 1
        });
        let series = &mut products[position];
        series.observations.push(observation);
        series.features.push(features);
    }
    for series in &mut products {
        sort_series_by_date(series);
    }
    products
}

fn sort_series_by_date(series: &mut ProductSeries) {
    let mut rows: Vec<(HistoricalObservation, Vec<f64>)> = series
        .observations
        .drain(..)
        .zip(series.features.drain(..))
        .collect();
    rows.sort_by_key(|(obs, _)| obs.date);
    for (obs, features) in rows {
        series.observations.push(obs);
        series.features.push(features);
    }
}

/// Demand forecast for one product, ready for depletion simulation.
#[derive(Debug, Clone)]
pub struct ProductForecast {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: i64,
    /// Future demand, ascending by date
    pub points: Vec<ForecastPoint>,
}

/// Runs fit and predict for individual products against a shared regressor schema.
pub struct ForecastOrchestrator {
    forecaster: Arc<dyn Forecaster>,
    config: ForecastConfig,
}

impl ForecastOrchestrator {
    pub fn new(forecaster: Arc<dyn Forecaster>, config: ForecastConfig) -> Self {
        Self { forecaster, config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn forecaster_name(&self) -> &'static str {
        self.forecaster.name()
    }

    /// Forecasts demand for one product.
    ///
    /// Short histories and missing stock rows come back as
    /// [`ServiceError::InsufficientData`] and [`ServiceError::MissingStockSnapshot`],
    /// which callers treat as skips. Anything else is a [`ServiceError::PredictionError`].
    #[instrument(skip_all, fields(product_id = %series.product_id, points = series.len()))]
    pub fn forecast_product(
        &self,
        series: &ProductSeries,
        stock: Option<&StockSnapshot>,
        schema: &RegressorSchema,
    ) -> Result<ProductForecast, ServiceError> {
        let required = self.config.min_history_points as usize;
        if series.len() < required {
            debug!("not enough history to fit a trend");
            return Err(ServiceError::InsufficientData {
                product_id: series.product_id.clone(),
                required,
                actual: series.len(),
            });
        }

        let Some(stock) = stock else {
            warn!(
                product_id = %series.product_id,
                product_name = %series.product_name,
                "no stock snapshot for product, skipping"
            );
            return Err(ServiceError::MissingStockSnapshot {
                product_id: series.product_id.clone(),
            });
        };

        let model = self
            .forecaster
            .fit(&series.to_series_points())
            .map_err(|err| self.fit_error(series, err))?;

        if model.regressor_width() != schema.width() {
            return Err(ServiceError::PredictionError(format!(
                "model for product {} was fitted with {} regressors, schema has {}",
                series.product_id,
                model.regressor_width(),
                schema.width()
            )));
        }

        let periods = self.future_periods(model.as_ref(), series)?;
        let future: Vec<FutureContext> = periods
            .iter()
            .map(|period| FutureContext {
                ds: period.date,
                regressors: schema.encode(&period.context),
            })
            .collect();

        let mut points: Vec<ForecastPoint> = model
            .predict(&future)?
            .into_iter()
            .map(|prediction| ForecastPoint::clamped(prediction.ds, prediction.yhat))
            .collect();
        points.sort_by_key(|point| point.date);

        debug!(horizon = points.len(), "forecast complete");
        Ok(ProductForecast {
            product_id: series.product_id.clone(),
            product_name: series.product_name.clone(),
            current_stock: stock.current_stock,
            points,
        })
    }

    /// Future dates with calendar-derived season and month; region and
    /// holiday carry over from the product's latest observation.
    pub fn future_periods(
        &self,
        model: &dyn TrainedModel,
        series: &ProductSeries,
    ) -> Result<Vec<FuturePeriod>, ServiceError> {
        let latest = series.observations.last().ok_or_else(|| {
            ServiceError::PredictionError(format!(
                "product {} has no observations to extend",
                series.product_id
            ))
        })?;

        Ok(model
            .future_dates(self.config.horizon_days as usize)
            .into_iter()
            .map(|date| FuturePeriod {
                date,
                context: ObservationContext {
                    season: calendar::season_for_date(date).to_string(),
                    month: calendar::month_name(date),
                    region: latest.region.clone(),
                    holiday: latest.holiday.clone(),
                },
            })
            .collect())
    }

    fn fit_error(&self, series: &ProductSeries, err: ForecastError) -> ServiceError {
        match err {
            ForecastError::InsufficientData { required, actual } => {
                ServiceError::InsufficientData {
                    product_id: series.product_id.clone(),
                    required,
                    actual,
                }
            }
            other => ServiceError::PredictionError(format!(
                "{} failed to fit product {}: {}",
                self.forecaster.name(),
                series.product_id,
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{encode_observations, AdditiveRegressionForecaster, Prediction};
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate};
    use std::sync::Mutex;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn obs(id: &str, date: NaiveDate, region: &str, holiday: &str, qty: f64) -> HistoricalObservation {
        HistoricalObservation {
            date,
            product_id: id.into(),
            product_name: format!("Product {}", id),
            region: region.into(),
            season: "Winter".into(),
            month: "January".into(),
            holiday: holiday.into(),
            quantity_sold: qty,
        }
    }

    fn stock(id: &str, level: i64) -> StockSnapshot {
        StockSnapshot {
            product_id: id.into(),
            current_stock: level,
        }
    }

    /// Replays a fixed demand script and records the regressors it is asked to predict with.
    struct ScriptedForecaster {
        demand: Vec<f64>,
        seen_future: Arc<Mutex<Vec<FutureContext>>>,
    }

    struct ScriptedModel {
        demand: Vec<f64>,
        width: usize,
        last: NaiveDate,
        seen_future: Arc<Mutex<Vec<FutureContext>>>,
    }

    impl Forecaster for ScriptedForecaster {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fit(&self, series: &[SeriesPoint]) -> Result<Box<dyn TrainedModel>, ForecastError> {
            if series.len() < 2 {
                return Err(ForecastError::InsufficientData {
                    required: 2,
                    actual: series.len(),
                });
            }
            Ok(Box::new(ScriptedModel {
                demand: self.demand.clone(),
                width: series[0].regressors.len(),
                last: series.iter().map(|p| p.ds).max().unwrap(),
                seen_future: self.seen_future.clone(),
            }))
        }
    }

    impl TrainedModel for ScriptedModel {
        fn regressor_width(&self) -> usize {
            self.width
        }

        fn last_observed(&self) -> NaiveDate {
            self.last
        }

        fn predict(&self, future: &[FutureContext]) -> Result<Vec<Prediction>, ForecastError> {
            self.seen_future.lock().unwrap().extend(future.iter().cloned());
            Ok(future
                .iter()
                .enumerate()
                .map(|(i, ctx)| Prediction {
                    ds: ctx.ds,
                    yhat: self.demand.get(i).copied().unwrap_or(0.0),
                })
                .collect())
        }
    }

    fn scripted(demand: Vec<f64>) -> (Arc<ScriptedForecaster>, Arc<Mutex<Vec<FutureContext>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(ScriptedForecaster {
                demand,
                seen_future: seen.clone(),
            }),
            seen,
        )
    }

    #[test]
    fn groups_products_in_first_appearance_order() {
        let encoded = encode_observations(vec![
            obs("2", day(1, 1), "North", "No", 1.0),
            obs("1", day(1, 1), "North", "No", 2.0),
            obs("2", day(1, 2), "North", "No", 3.0),
        ]);
        let products = group_by_product(encoded);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product_id, "2");
        assert_eq!(products[0].demand(), vec![1.0, 3.0]);
        assert_eq!(products[1].product_id, "1");
    }

    #[test]
    fn same_id_with_different_names_forms_separate_series() {
        let mut renamed = obs("1", day(1, 2), "North", "No", 4.0);
        renamed.product_name = "Widget v2".into();
        let encoded = encode_observations(vec![
            obs("1", day(1, 1), "North", "No", 2.0),
            renamed,
            obs("1", day(1, 3), "North", "No", 6.0),
        ]);
        let products = group_by_product(encoded);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product_name, "Product 1");
        assert_eq!(products[0].demand(), vec![2.0, 6.0]);
        assert_eq!(products[1].product_name, "Widget v2");
    }

    #[test]
    fn interleaved_products_keep_rows_and_first_appearance_order() {
        // Rows arrive newest first and interleaved across products
        let mut rows = Vec::new();
        for d in (1..=3).rev() {
            for id in (0..500).rev() {
                rows.push(obs(&id.to_string(), day(1, d), "North", "No", d as f64));
            }
        }
        let products = group_by_product(encode_observations(rows));
        assert_eq!(products.len(), 500);
        assert_eq!(products[0].product_id, "499");
        assert_eq!(products[499].product_id, "0");
        assert!(products.iter().all(|p| p.demand() == vec![1.0, 2.0, 3.0]));
        assert!(products.iter().all(|p| p.features.len() == p.len()));
    }

    #[test]
    fn scenario_a_forecasts_five_days_after_history() {
        let encoded = encode_observations(vec![
            obs("P", day(1, 1), "North", "No", 5.0),
            obs("P", day(1, 2), "North", "No", 5.0),
        ]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let (forecaster, _) = scripted(vec![5.0; 5]);
        let orchestrator = ForecastOrchestrator::new(forecaster, ForecastConfig::default());

        let forecast = orchestrator
            .forecast_product(&products[0], Some(&stock("P", 8)), &schema)
            .unwrap();
        assert_eq!(forecast.current_stock, 8);
        assert_eq!(forecast.points.len(), 5);
        assert_eq!(forecast.points[0].date, day(1, 3));
        assert_eq!(forecast.points[4].date, day(1, 7));
        assert!(forecast.points.iter().all(|p| p.predicted_quantity == 5.0));
    }

    #[test]
    fn single_point_history_is_insufficient() {
        let encoded = encode_observations(vec![obs("Q", day(1, 1), "North", "No", 5.0)]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let (forecaster, _) = scripted(vec![5.0; 5]);
        let orchestrator = ForecastOrchestrator::new(forecaster, ForecastConfig::default());

        // History is checked before stock
        let err = orchestrator
            .forecast_product(&products[0], None, &schema)
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::InsufficientData {
                required: 2,
                actual: 1,
                ..
            }
        );
    }

    #[test]
    fn missing_stock_snapshot_is_reported() {
        let encoded = encode_observations(vec![
            obs("R", day(1, 1), "North", "No", 5.0),
            obs("R", day(1, 2), "North", "No", 5.0),
        ]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let (forecaster, seen) = scripted(vec![5.0; 5]);
        let orchestrator = ForecastOrchestrator::new(forecaster, ForecastConfig::default());

        let err = orchestrator
            .forecast_product(&products[0], None, &schema)
            .unwrap_err();
        assert_matches!(err, ServiceError::MissingStockSnapshot { ref product_id } if product_id == "R");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn future_contexts_use_training_columns_and_carry_region_forward() {
        // March 30 and 31 are in history, so the horizon crosses into April
        let mut history = vec![
            obs("P", day(3, 30), "South", "Yes", 4.0),
            obs("P", day(3, 31), "North", "No", 6.0),
        ];
        history[0].season = "Summer".into();
        history[0].month = "March".into();
        history[1].season = "Monsoon".into();
        history[1].month = "April".into();
        let encoded = encode_observations(history);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let (forecaster, seen) = scripted(vec![1.0; 5]);
        let orchestrator = ForecastOrchestrator::new(forecaster, ForecastConfig::default());

        orchestrator
            .forecast_product(&products[0], Some(&stock("P", 100)), &schema)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        let names = schema.column_names();
        for ctx in seen.iter() {
            assert_eq!(ctx.regressors.len(), schema.width());
            let hot: Vec<&String> = names
                .iter()
                .zip(&ctx.regressors)
                .filter(|(_, v)| **v == 1.0)
                .map(|(n, _)| n)
                .collect();
            // April maps to Summer; North/No come from the latest observation
            // and are both reference categories
            assert_eq!(hot, vec!["season_Summer"]);
        }
        assert_eq!(seen[0].ds, day(4, 1));
    }

    #[test]
    fn negative_predictions_are_clamped() {
        let encoded = encode_observations(vec![
            obs("P", day(1, 1), "North", "No", 5.0),
            obs("P", day(1, 2), "North", "No", 5.0),
        ]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let (forecaster, _) = scripted(vec![-3.0, 2.0, -0.5, 1.0, 0.0]);
        let orchestrator = ForecastOrchestrator::new(forecaster, ForecastConfig::default());
        let forecast = orchestrator
            .forecast_product(&products[0], Some(&stock("P", 8)), &schema)
            .unwrap();
        assert!(forecast.points.iter().all(|p| p.predicted_quantity >= 0.0));
        assert_eq!(forecast.points[0].predicted_quantity, 0.0);
    }

    #[test]
    fn horizon_follows_configuration() {
        let encoded = encode_observations(vec![
            obs("P", day(1, 1), "North", "No", 5.0),
            obs("P", day(1, 2), "North", "No", 5.0),
        ]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let config = ForecastConfig {
            horizon_days: 14,
            ..Default::default()
        };
        let orchestrator =
            ForecastOrchestrator::new(Arc::new(AdditiveRegressionForecaster::default()), config);
        let forecast = orchestrator
            .forecast_product(&products[0], Some(&stock("P", 8)), &schema)
            .unwrap();
        assert_eq!(forecast.points.len(), 14);
        assert_eq!(
            forecast.points.last().unwrap().date,
            day(1, 2) + Duration::days(14)
        );
    }

    #[test]
    fn bundled_model_reproduces_flat_demand() {
        let encoded = encode_observations(vec![
            obs("P", day(1, 1), "North", "No", 5.0),
            obs("P", day(1, 2), "North", "No", 5.0),
        ]);
        let schema = encoded.schema.clone();
        let products = group_by_product(encoded);
        let orchestrator = ForecastOrchestrator::new(
            Arc::new(AdditiveRegressionForecaster::default()),
            ForecastConfig::default(),
        );
        let forecast = orchestrator
            .forecast_product(&products[0], Some(&stock("P", 8)), &schema)
            .unwrap();
        for point in &forecast.points {
            assert!((point.predicted_quantity - 5.0).abs() < 1e-9);
        }
    }
}
