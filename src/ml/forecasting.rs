//! Demand forecasting contract and the bundled additive regression model.
//!
//! The restock pipeline only talks to [`Forecaster`] and [`TrainedModel`];
//! any fit-and-predict model with exogenous regressors can be plugged in.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: {actual} point(s), at least {required} required")]
    InsufficientData { required: usize, actual: usize },

    #[error("regressor width mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("singular system while fitting model")]
    Singular,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// One training point: time, target value and the full regressor vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub ds: NaiveDate,
    pub y: f64,
    pub regressors: Vec<f64>,
}

/// One future period to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureContext {
    pub ds: NaiveDate,
    pub regressors: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub ds: NaiveDate,
    pub yhat: f64,
}

/// Fits a model to an ordered series.
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails with [`ForecastError::InsufficientData`] below two points.
    fn fit(&self, series: &[SeriesPoint]) -> Result<Box<dyn TrainedModel>, ForecastError>;
}

/// A fitted model able to predict future periods.
pub trait TrainedModel: Send {
    /// Number of regressors the model was fitted with.
    fn regressor_width(&self) -> usize;

    /// Last time point seen during fitting.
    fn last_observed(&self) -> NaiveDate;

    /// Predicts one value per future context, in input order.
    fn predict(&self, future: &[FutureContext]) -> Result<Vec<Prediction>, ForecastError>;

    /// Daily dates following the training window, history excluded.
    fn future_dates(&self, periods: usize) -> Vec<NaiveDate> {
        let last = self.last_observed();
        (1..=periods as i64)
            .map(|offset| last + Duration::days(offset))
            .collect()
    }
}

/// `y(t) = intercept + slope * t + Σ βᵢ xᵢ`, fitted by ridge-regularised least squares.
///
/// `t` is measured in days since the first observation and scaled by the
/// training span, so the training window maps onto `[0, 1]`.
#[derive(Debug, Clone)]
pub struct AdditiveRegressionForecaster {
    regularization: f64,
}

impl Default for AdditiveRegressionForecaster {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl AdditiveRegressionForecaster {
    pub fn new(regularization: f64) -> Self {
        Self {
            regularization: regularization.max(0.0),
        }
    }
}

const MIN_FIT_POINTS: usize = 2;
const PIVOT_EPSILON: f64 = 1e-12;

impl Forecaster for AdditiveRegressionForecaster {
    fn name(&self) -> &'static str {
        "additive-regression"
    }

    fn fit(&self, series: &[SeriesPoint]) -> Result<Box<dyn TrainedModel>, ForecastError> {
        if series.len() < MIN_FIT_POINTS {
            return Err(ForecastError::InsufficientData {
                required: MIN_FIT_POINTS,
                actual: series.len(),
            });
        }

        let width = series[0].regressors.len();
        if let Some(bad) = series.iter().find(|p| p.regressors.len() != width) {
            return Err(ForecastError::DimensionMismatch {
                expected: width,
                actual: bad.regressors.len(),
            });
        }
        if series.iter().any(|p| !p.y.is_finite()) {
            return Err(ForecastError::NonFinite("target"));
        }

        let start = series.iter().map(|p| p.ds).min().unwrap_or(series[0].ds);
        let end = series.iter().map(|p| p.ds).max().unwrap_or(series[0].ds);
        let span = ((end - start).num_days() as f64).max(1.0);

        // Design columns: intercept, trend, regressors
        let dim = width + 2;
        let mut gram = vec![vec![0.0; dim]; dim];
        let mut moment = vec![0.0; dim];
        let mut row = vec![0.0; dim];
        for point in series {
            row[0] = 1.0;
            row[1] = (point.ds - start).num_days() as f64 / span;
            row[2..].copy_from_slice(&point.regressors);
            for i in 0..dim {
                moment[i] += row[i] * point.y;
                for j in 0..dim {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        // The intercept is left unpenalised
        for (i, gram_row) in gram.iter_mut().enumerate().skip(1) {
            gram_row[i] += self.regularization;
        }

        let coefficients = solve(gram, moment)?;
        Ok(Box::new(AdditiveRegressionModel {
            coefficients,
            start,
            span,
            last_observed: end,
        }))
    }
}

#[derive(Debug, Clone)]
struct AdditiveRegressionModel {
    coefficients: Vec<f64>,
    start: NaiveDate,
    span: f64,
    last_observed: NaiveDate,
}

impl TrainedModel for AdditiveRegressionModel {
    fn regressor_width(&self) -> usize {
        self.coefficients.len() - 2
    }

    fn last_observed(&self) -> NaiveDate {
        self.last_observed
    }

    fn predict(&self, future: &[FutureContext]) -> Result<Vec<Prediction>, ForecastError> {
        let width = self.regressor_width();
        future
            .iter()
            .map(|ctx| {
                if ctx.regressors.len() != width {
                    return Err(ForecastError::DimensionMismatch {
                        expected: width,
                        actual: ctx.regressors.len(),
                    });
                }
                let t = (ctx.ds - self.start).num_days() as f64 / self.span;
                let regression: f64 = self.coefficients[2..]
                    .iter()
                    .zip(&ctx.regressors)
                    .map(|(beta, x)| beta * x)
                    .sum();
                let yhat = self.coefficients[0] + self.coefficients[1] * t + regression;
                if !yhat.is_finite() {
                    return Err(ForecastError::NonFinite("prediction"));
                }
                Ok(Prediction { ds: ctx.ds, yhat })
            })
            .collect()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ForecastError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ForecastError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in (col + 1)..n {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = ((r + 1)..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite("coefficients"));
    }
    Ok(x)
}
