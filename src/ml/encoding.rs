//! One-hot encoding of the categorical context columns.
//!
//! The column set is computed once from the historical observations and then
//! reused verbatim for every future context. Categories that were never seen
//! in history encode as zeros; they never add columns.

use crate::models::{HistoricalObservation, ObservationContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

/// Categorical fields used as regressors, in encoding order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContextField {
    Season,
    Month,
    Region,
    Holiday,
}

impl ContextField {
    pub fn value_of<'a>(&self, context: &'a ObservationContext) -> &'a str {
        match self {
            ContextField::Season => &context.season,
            ContextField::Month => &context.month,
            ContextField::Region => &context.region,
            ContextField::Holiday => &context.holiday,
        }
    }
}

/// A single one-hot column: indicator for `field == category`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegressorColumn {
    pub field: ContextField,
    pub category: String,
}

impl fmt::Display for RegressorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field, self.category)
    }
}

/// Ordered regressor columns derived from training data.
///
/// For every field the categories are sorted and the first one is dropped as
/// the reference category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegressorSchema {
    columns: Vec<RegressorColumn>,
}

impl RegressorSchema {
    pub fn from_observations(observations: &[HistoricalObservation]) -> Self {
        let contexts: Vec<ObservationContext> =
            observations.iter().map(|obs| obs.context()).collect();
        Self::from_contexts(&contexts)
    }

    pub fn from_contexts(contexts: &[ObservationContext]) -> Self {
        let mut columns = Vec::new();
        for field in ContextField::iter() {
            let categories: BTreeSet<&str> =
                contexts.iter().map(|ctx| field.value_of(ctx)).collect();
            columns.extend(categories.into_iter().skip(1).map(|category| RegressorColumn {
                field,
                category: category.to_string(),
            }));
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[RegressorColumn] {
        &self.columns
    }

    /// Column names in `field_category` form, in model order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.to_string()).collect()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Encodes one context against this schema's columns.
    pub fn encode(&self, context: &ObservationContext) -> Vec<f64> {
        self.columns
            .iter()
            .map(|column| {
                if column.field.value_of(context) == column.category {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Historical observations together with their encoded regressor rows.
#[derive(Debug, Clone)]
pub struct EncodedObservations {
    pub observations: Vec<HistoricalObservation>,
    /// One row per observation, `schema.width()` values each
    pub features: Vec<Vec<f64>>,
    pub schema: RegressorSchema,
}

pub fn encode_observations(observations: Vec<HistoricalObservation>) -> EncodedObservations {
    let schema = RegressorSchema::from_observations(&observations);
    let features = observations
        .iter()
        .map(|obs| schema.encode(&obs.context()))
        .collect();
    EncodedObservations {
        observations,
        features,
        schema,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn ctx(season: &str, month: &str, region: &str, holiday: &str) -> ObservationContext {
        ObservationContext {
            season: season.into(),
            month: month.into(),
            region: region.into(),
            holiday: holiday.into(),
        }
    }

    #[test]
    fn drops_first_sorted_category_per_field() {
        let schema = RegressorSchema::from_contexts(&[
            ctx("Winter", "January", "North", "No"),
            ctx("Summer", "April", "South", "Yes"),
            ctx("Monsoon", "July", "North", "No"),
        ]);
        assert_eq!(
            schema.column_names(),
            vec![
                "season_Summer",
                "season_Winter",
                "month_January",
                "month_July",
                "region_South",
                "holiday_Yes",
            ]
        );
    }

    #[test]
    fn single_category_fields_produce_no_columns() {
        let schema = RegressorSchema::from_contexts(&[
            ctx("Winter", "January", "North", "No"),
            ctx("Winter", "January", "North", "No"),
        ]);
        assert_eq!(schema.width(), 0);
        assert!(schema.encode(&ctx("Summer", "May", "East", "Yes")).is_empty());
    }

    #[test]
    fn reference_and_unseen_categories_encode_as_zero() {
        let schema = RegressorSchema::from_contexts(&[
            ctx("Winter", "January", "North", "No"),
            ctx("Summer", "April", "South", "Yes"),
        ]);
        // Summer is the reference season; Autumn and West were never seen
        let encoded = schema.encode(&ctx("Autumn", "April", "West", "Yes"));
        assert_eq!(encoded.len(), schema.width());
        let names = schema.column_names();
        for (name, value) in names.iter().zip(&encoded) {
            let expected = if name == "holiday_Yes" { 1.0 } else { 0.0 };
            assert_eq!(*value, expected, "column {}", name);
        }
    }

    #[test]
    fn encode_observations_aligns_rows_with_schema() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let observations = vec![
            HistoricalObservation {
                date,
                product_id: "1".into(),
                product_name: "Widget".into(),
                region: "North".into(),
                season: "Winter".into(),
                month: "January".into(),
                holiday: "No".into(),
                quantity_sold: 3.0,
            },
            HistoricalObservation {
                date,
                product_id: "1".into(),
                product_name: "Widget".into(),
                region: "South".into(),
                season: "Winter".into(),
                month: "January".into(),
                holiday: "No".into(),
                quantity_sold: 2.0,
            },
        ];
        let encoded = encode_observations(observations);
        assert_eq!(encoded.schema.column_names(), vec!["region_South"]);
        assert_eq!(encoded.features, vec![vec![0.0], vec![1.0]]);
    }

    fn context_strategy() -> impl Strategy<Value = ObservationContext> {
        (
            prop_oneof!["Winter", "Summer", "Monsoon", "Autumn"],
            prop_oneof!["January", "April", "July", "October"],
            prop_oneof!["North", "South", "East"],
            prop_oneof!["Yes", "No"],
        )
            .prop_map(|(s, m, r, h)| ctx(&s, &m, &r, &h))
    }

    proptest! {
        #[test]
        fn future_encoding_keeps_training_width_and_order(
            history in prop::collection::vec(context_strategy(), 1..40),
            future in context_strategy(),
        ) {
            let schema = RegressorSchema::from_contexts(&history);
            let rebuilt = RegressorSchema::from_contexts(&history);
            prop_assert_eq!(&schema, &rebuilt);
            prop_assert_eq!(schema.encode(&future).len(), schema.width());
        }

        #[test]
        fn each_field_sets_at_most_one_indicator(
            history in prop::collection::vec(context_strategy(), 1..40),
            future in context_strategy(),
        ) {
            let schema = RegressorSchema::from_contexts(&history);
            let encoded = schema.encode(&future);
            for field in ContextField::iter() {
                let hot: f64 = schema
                    .columns()
                    .iter()
                    .zip(&encoded)
                    .filter(|(column, _)| column.field == field)
                    .map(|(_, value)| *value)
                    .sum();
                prop_assert!(hot <= 1.0);
            }
        }
    }
}
