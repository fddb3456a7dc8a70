//! Parsing and aggregation of the uploaded CSV tables.

use crate::errors::ServiceError;
use crate::models::observation::{HISTORICAL_REQUIRED_COLUMNS, STOCK_REQUIRED_COLUMNS};
use crate::models::{HistoricalObservation, ObservationKey, StockSnapshot};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

/// Known transcription defects in the month column.
const MONTH_CORRECTIONS: &[(&str, &str)] = &[("Septembe", "September")];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Normalized pipeline input.
#[derive(Debug, Clone)]
pub struct NormalizedData {
    /// Aggregated observations, sorted by grouping key
    pub observations: Vec<HistoricalObservation>,
    pub stock: Vec<StockSnapshot>,
    pub dropped: DroppedRows,
}

/// Historical rows left out of aggregation, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedRows {
    /// Date column missing or in no accepted format
    pub unparseable_date: usize,
    /// One of the grouping columns left blank
    pub blank_grouping_field: usize,
}

impl DroppedRows {
    pub fn total(&self) -> usize {
        self.unparseable_date + self.blank_grouping_field
    }
}

/// Parses both uploads and aggregates the historical rows.
#[instrument(skip_all, fields(historical_bytes = historical.len(), stock_bytes = stock.len()))]
pub fn normalize(historical: &str, stock: &str) -> Result<NormalizedData, ServiceError> {
    let (raw, dropped) = parse_historical(historical)?;
    let stock = parse_stock(stock)?;
    let observations = aggregate(raw);
    debug!(
        observations = observations.len(),
        stock_rows = stock.len(),
        unparseable_date = dropped.unparseable_date,
        blank_grouping_field = dropped.blank_grouping_field,
        "normalized upload"
    );
    Ok(NormalizedData {
        observations,
        stock,
        dropped,
    })
}

/// Sums `quantity_sold` over rows that share the full grouping key.
///
/// Applying this to already-aggregated observations returns them unchanged.
pub fn aggregate(rows: Vec<HistoricalObservation>) -> Vec<HistoricalObservation> {
    let mut groups: BTreeMap<ObservationKey, f64> = BTreeMap::new();
    for row in rows {
        let quantity = row.quantity_sold;
        *groups.entry(row.key()).or_insert(0.0) += quantity;
    }
    groups
        .into_iter()
        .map(|(key, quantity)| key.into_observation(quantity))
        .collect()
}

/// Lenient date parsing; `None` means the row should be dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Capitalizes the month label and repairs known typos.
pub fn normalize_month(raw: &str) -> String {
    let capitalized = capitalize(raw);
    MONTH_CORRECTIONS
        .iter()
        .find(|(typo, _)| *typo == capitalized)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or(capitalized)
}

fn capitalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(table: &str, headers: &StringRecord, required: &[&str]) -> Result<Self, ServiceError> {
        let positions: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|column| !positions.contains_key(*column))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::DataFormatError(format!(
                "{} data is missing required column(s): {}",
                table,
                missing.join(", ")
            )));
        }
        Ok(Self { positions })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }
}

fn reader(raw: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(raw.as_bytes())
}

fn parse_historical(raw: &str) -> Result<(Vec<HistoricalObservation>, DroppedRows), ServiceError> {
    let mut rdr = reader(raw);
    let columns = ColumnIndex::new("historical", rdr.headers()?, &HISTORICAL_REQUIRED_COLUMNS)?;

    let mut rows = Vec::new();
    let mut dropped = DroppedRows::default();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let Some(date) = parse_date(columns.get(&record, "date")) else {
            dropped.unparseable_date += 1;
            continue;
        };

        let product_id = columns.get(&record, "product_id");
        let product_name = columns.get(&record, "product_name");
        let region = columns.get(&record, "region");
        let season = columns.get(&record, "season");
        let month = columns.get(&record, "month");
        let holiday = columns.get(&record, "holiday");
        if [product_id, product_name, region, season, month, holiday]
            .iter()
            .any(|value| value.is_empty())
        {
            dropped.blank_grouping_field += 1;
            continue;
        }

        let quantity_raw = columns.get(&record, "quantity_sold");
        // Blank quantities contribute nothing to the sum
        let quantity_sold = if quantity_raw.is_empty() {
            0.0
        } else {
            quantity_raw
                .parse::<f64>()
                .ok()
                .filter(|q| q.is_finite())
                .ok_or_else(|| {
                    ServiceError::DataFormatError(format!(
                        "historical data row {}: quantity_sold '{}' is not a number",
                        line + 2,
                        quantity_raw
                    ))
                })?
        };

        rows.push(HistoricalObservation {
            date,
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            region: region.to_string(),
            season: season.to_string(),
            month: normalize_month(month),
            holiday: holiday.to_string(),
            quantity_sold,
        });
    }
    Ok((rows, dropped))
}

fn parse_stock(raw: &str) -> Result<Vec<StockSnapshot>, ServiceError> {
    let mut rdr = reader(raw);
    let columns = ColumnIndex::new("stock", rdr.headers()?, &STOCK_REQUIRED_COLUMNS)?;

    let mut snapshots = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let product_id = columns.get(&record, "product_id");
        if product_id.is_empty() {
            continue;
        }
        let stock_raw = columns.get(&record, "current_stock");
        let current_stock = parse_stock_level(stock_raw).ok_or_else(|| {
            ServiceError::DataFormatError(format!(
                "stock data row {}: current_stock '{}' is not a number",
                line + 2,
                stock_raw
            ))
        })?;
        snapshots.push(StockSnapshot {
            product_id: product_id.to_string(),
            current_stock,
        });
    }
    Ok(snapshots)
}

fn parse_stock_level(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
    })
}
