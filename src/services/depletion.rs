use crate::models::ForecastPoint;
use chrono::NaiveDate;

/// First projected stock-out within the forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockOut {
    pub date: NaiveDate,
    /// 1-based position of `date` in the horizon
    pub day_index: u32,
    /// Running stock right after the crossing, at or below zero
    pub projected_stock: f64,
}

/// Walks the forecast in date order and returns the first period where the
/// running stock reaches zero or below.
///
/// Demand is floored to whole units and never subtracted as a negative value.
pub fn simulate(forecast: &[ForecastPoint], starting_stock: f64) -> Option<StockOut> {
    let mut ordered: Vec<&ForecastPoint> = forecast.iter().collect();
    ordered.sort_by_key(|point| point.date);

    let mut stock = starting_stock;
    for (index, point) in ordered.into_iter().enumerate() {
        stock -= consumed_units(point.predicted_quantity);
        if stock <= 0.0 {
            return Some(StockOut {
                date: point.date,
                day_index: index as u32 + 1,
                projected_stock: stock,
            });
        }
    }
    None
}

fn consumed_units(predicted_quantity: f64) -> f64 {
    if predicted_quantity.is_finite() {
        predicted_quantity.trunc().max(0.0)
    } else {
        0.0
    }
}
