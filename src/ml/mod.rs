/*!
 * # Machine Learning Module
 *
 * Demand forecasting building blocks for the restock pipeline:
 *
 * - `calendar`: fixed month/season context for future dates
 * - `encoding`: one-hot regressor schema shared by training and prediction
 * - `forecasting`: the fit/predict contract and the bundled additive model
 */

pub mod calendar;
pub mod encoding;
pub mod forecasting;

pub use encoding::{encode_observations, ContextField, EncodedObservations, RegressorSchema};
pub use forecasting::{
    AdditiveRegressionForecaster, ForecastError, Forecaster, FutureContext, Prediction,
    SeriesPoint, TrainedModel,
};
