use super::ObservationContext;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A future date together with the context it is forecast under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuturePeriod {
    pub date: NaiveDate,
    pub context: ObservationContext,
}

/// Predicted demand for one future date. `predicted_quantity` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_quantity: f64,
}

impl ForecastPoint {
    /// Builds a point, clamping negative or non-finite demand to zero.
    pub fn clamped(date: NaiveDate, predicted_quantity: f64) -> Self {
        let predicted_quantity = if predicted_quantity.is_finite() {
            predicted_quantity.max(0.0)
        } else {
            0.0
        };
        Self {
            date,
            predicted_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_nan_demand_clamp_to_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(ForecastPoint::clamped(date, -3.2).predicted_quantity, 0.0);
        assert_eq!(ForecastPoint::clamped(date, f64::NAN).predicted_quantity, 0.0);
        assert_eq!(ForecastPoint::clamped(date, 2.5).predicted_quantity, 2.5);
    }
}
