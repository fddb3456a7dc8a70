//! Domain records flowing through the restock pipeline.

pub mod alert;
pub mod forecast;
pub mod observation;

pub use alert::{AlertBatch, AlertStatus, RestockAlert, SkipReason, SkippedProduct};
pub use forecast::{ForecastPoint, FuturePeriod};
pub use observation::{
    product_sort_key, HistoricalObservation, ObservationContext, ObservationKey, StockSnapshot,
};
