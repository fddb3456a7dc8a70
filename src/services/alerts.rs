use crate::config::ForecastConfig;
use crate::models::{AlertStatus, RestockAlert};
use crate::services::depletion::StockOut;

/// Identity and stock of a product being evaluated for an alert.
#[derive(Debug, Clone, Copy)]
pub struct AlertSubject<'a> {
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub current_stock: i64,
}

/// One cover period of average recent demand, floored.
///
/// `history` is the product's observed demand in date order; only the last
/// `lookback` values are used. The summed demand is floored before averaging.
pub fn suggested_restock_quantity(history: &[f64], lookback: usize, cover_days: u32) -> i64 {
    let window = lookback.min(history.len());
    if window == 0 {
        return 0;
    }
    let recent_total = history[history.len() - window..].iter().sum::<f64>().trunc();
    let average_daily = recent_total / window as f64;
    (average_daily * cover_days as f64).trunc() as i64
}

/// Builds the alert for a product that is projected to run out.
pub fn synthesize(
    subject: AlertSubject<'_>,
    stock_out: &StockOut,
    history: &[f64],
    config: &ForecastConfig,
) -> RestockAlert {
    RestockAlert {
        product_id: subject.product_id.to_string(),
        product_name: subject.product_name.to_string(),
        stock_out_date: Some(stock_out.date),
        current_stock: subject.current_stock,
        suggested_restock_quantity: suggested_restock_quantity(
            history,
            config.lookback_window as usize,
            config.cover_days,
        ),
        days_until_stockout: Some(stock_out.day_index),
        status: AlertStatus::classify(
            stock_out.day_index,
            config.urgent_within_days,
            config.warning_within_days,
        ),
    }
}
