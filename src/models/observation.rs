use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns the historical sales upload must carry.
pub const HISTORICAL_REQUIRED_COLUMNS: [&str; 8] = [
    "date",
    "product_id",
    "product_name",
    "region",
    "season",
    "month",
    "holiday",
    "quantity_sold",
];

/// Columns the stock snapshot upload must carry.
pub const STOCK_REQUIRED_COLUMNS: [&str; 2] = ["product_id", "current_stock"];

/// Name of the time axis expected by the forecaster.
pub const TIME_AXIS_COLUMN: &str = "ds";

/// Name of the target value expected by the forecaster.
pub const TARGET_COLUMN: &str = "y";

/// One aggregated sales observation.
///
/// After normalization the grouping key `(date, product_id, product_name,
/// region, season, month, holiday)` is unique across the observation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoricalObservation {
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub region: String,
    pub season: String,
    pub month: String,
    pub holiday: String,
    #[serde(rename = "y")]
    pub quantity_sold: f64,
}

/// Grouping key used when aggregating raw rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservationKey {
    pub date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub region: String,
    pub season: String,
    pub month: String,
    pub holiday: String,
}

impl ObservationKey {
    pub fn into_observation(self, quantity_sold: f64) -> HistoricalObservation {
        HistoricalObservation {
            date: self.date,
            product_id: self.product_id,
            product_name: self.product_name,
            region: self.region,
            season: self.season,
            month: self.month,
            holiday: self.holiday,
            quantity_sold,
        }
    }
}

/// Categorical context of an observation, used as model regressors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationContext {
    pub season: String,
    pub month: String,
    pub region: String,
    pub holiday: String,
}

impl HistoricalObservation {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            date: self.date,
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            region: self.region.clone(),
            season: self.season.clone(),
            month: self.month.clone(),
            holiday: self.holiday.clone(),
        }
    }

    pub fn context(&self) -> ObservationContext {
        ObservationContext {
            season: self.season.clone(),
            month: self.month.clone(),
            region: self.region.clone(),
            holiday: self.holiday.clone(),
        }
    }
}

/// Current on-hand stock for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockSnapshot {
    pub product_id: String,
    pub current_stock: i64,
}

/// Ordering key for product identifiers: numeric ids compare numerically,
/// everything else falls back to lexical order after them.
pub fn product_sort_key(product_id: &str) -> (u8, i64, &str) {
    match product_id.parse::<i64>() {
        Ok(n) => (0, n, product_id),
        Err(_) => (1, 0, product_id),
    }
}
