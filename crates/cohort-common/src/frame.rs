//! DataFrame and schema helpers.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use polars::prelude::{AnyValue, DataFrame, DataType, Expr, PolarsResult, Schema, TimeUnit};

use crate::any_value::{any_to_datetime, any_to_i64};

/// Milliseconds in one average (Julian) year of 365.25 days.
pub const MILLIS_PER_YEAR: f64 = 365.25 * 86_400_000.0;

/// Number of distinct values in the entity column.
pub fn count_entities(df: &DataFrame, entity_col: &str) -> PolarsResult<usize> {
    if df.height() == 0 {
        return Ok(0);
    }
    df.column(entity_col)?.n_unique()
}

/// Names from `required` that the schema lacks, in the order given.
pub fn missing_columns(schema: &Schema, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !schema.contains(name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Expression converting a date or datetime column to milliseconds since the epoch.
///
/// Used for duration arithmetic that must not depend on the time unit the
/// source table happened to be loaded with.
pub fn epoch_millis(expr: Expr) -> Expr {
    expr.cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        .cast(DataType::Int64)
}

/// Read a column as naive datetimes, row by row.
pub fn timestamp_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let column = df.column(name)?;
    let mut values = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        values.push(any_to_datetime(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(values)
}

/// Read a column as integers, row by row.
pub fn integer_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let column = df.column(name)?;
    let mut values = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        values.push(any_to_i64(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(values)
}

/// Count rows whose `(entity, timestamp)` pair already appeared earlier in the frame.
pub fn duplicate_key_count(
    df: &DataFrame,
    entity_col: &str,
    timestamp_col: &str,
) -> PolarsResult<usize> {
    let entities = integer_column(df, entity_col)?;
    let timestamps = timestamp_column(df, timestamp_col)?;
    let mut seen: HashSet<(Option<i64>, Option<NaiveDateTime>)> =
        HashSet::with_capacity(df.height());
    let mut duplicates = 0;
    for key in entities.into_iter().zip(timestamps) {
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::{Column, IntoColumn, NamedFrom, Series};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn frame(entities: Vec<i64>, days: Vec<u32>) -> DataFrame {
        let timestamps: Vec<NaiveDateTime> = days.into_iter().map(ts).collect();
        let columns: Vec<Column> = vec![
            Series::new("entity_id".into(), entities).into_column(),
            Series::new("timestamp".into(), timestamps).into_column(),
        ];
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn counts_distinct_entities() {
        let df = frame(vec![1, 1, 2, 3], vec![1, 2, 3, 4]);
        assert_eq!(count_entities(&df, "entity_id").unwrap(), 3);
        assert!(count_entities(&df, "missing").is_err());
    }

    #[test]
    fn counts_entities_of_empty_frame() {
        let df = frame(vec![], vec![]);
        assert_eq!(count_entities(&df, "entity_id").unwrap(), 0);
    }

    #[test]
    fn reports_missing_columns_in_order() {
        let df = frame(vec![1], vec![1]);
        let schema = df.schema();
        assert_eq!(
            missing_columns(schema, &["age", "entity_id", "date_of_birth"]),
            vec!["age".to_string(), "date_of_birth".to_string()]
        );
    }

    #[test]
    fn reads_timestamps_back() {
        let df = frame(vec![1, 2], vec![5, 6]);
        let values = timestamp_column(&df, "timestamp").unwrap();
        assert_eq!(values, vec![Some(ts(5)), Some(ts(6))]);
    }

    #[test]
    fn counts_duplicate_keys() {
        let df = frame(vec![1, 1, 1, 2], vec![1, 1, 2, 1]);
        assert_eq!(duplicate_key_count(&df, "entity_id", "timestamp").unwrap(), 1);
    }
}
