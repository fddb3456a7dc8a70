use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Urgency of a restock alert, derived from how soon the stock-out lands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertStatus {
    Urgent,
    Warning,
    Safe,
}

impl AlertStatus {
    pub fn classify(days_until_stockout: u32, urgent_within: u32, warning_within: u32) -> Self {
        if days_until_stockout <= urgent_within {
            AlertStatus::Urgent
        } else if days_until_stockout <= warning_within {
            AlertStatus::Warning
        } else {
            AlertStatus::Safe
        }
    }
}

/// Alert for a product projected to run out of stock within the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RestockAlert {
    pub product_id: String,
    pub product_name: String,
    /// First forecast date at which projected stock is at or below zero
    pub stock_out_date: Option<NaiveDate>,
    pub current_stock: i64,
    /// One cover period of average recent demand, floored
    #[serde(rename = "suggested_restock")]
    pub suggested_restock_quantity: i64,
    /// 1-based index of the stock-out date within the forecast horizon
    pub days_until_stockout: Option<u32>,
    pub status: AlertStatus,
}

/// Why a product did not make it into the alert evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    InsufficientHistory,
    MissingStockSnapshot,
    PredictionFailed,
    TimedOut,
}

/// Diagnostic entry for a skipped product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedProduct {
    pub product_id: String,
    pub product_name: String,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of one pipeline run. Replaced wholesale on every successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertBatch {
    pub alerts: Vec<RestockAlert>,
    pub skipped: Vec<SkippedProduct>,
    pub products_evaluated: usize,
    pub generated_at: DateTime<Utc>,
}

impl AlertBatch {
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
