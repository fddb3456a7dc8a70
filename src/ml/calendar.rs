//! Calendar context for future dates.
//!
//! The season table is fixed and deliberately not meteorological: it is the
//! mapping the historical uploads were labelled with.

use chrono::{Datelike, NaiveDate};

/// Season label for a calendar month (1-12).
pub fn season_for_month(month: u32) -> &'static str {
    match month {
        3..=5 => "Summer",
        6..=9 => "Monsoon",
        10..=11 => "Autumn",
        _ => "Winter",
    }
}

/// Full English month name, e.g. "September".
pub fn month_name(date: NaiveDate) -> String {
    date.format("%B").to_string()
}

pub fn season_for_date(date: NaiveDate) -> &'static str {
    season_for_month(date.month())
}
