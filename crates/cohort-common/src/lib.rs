//! Shared utilities for cohort crates.
//!
//! This crate provides Polars helpers used across the workspace:
//! `AnyValue` conversions (including datetimes), schema checks and the
//! counting primitives the filter chain builds its step trail from.

pub mod any_value;
pub mod frame;

// Re-export commonly used functions at crate root for convenience
pub use any_value::{
    any_to_datetime, any_to_f64, any_to_i64, any_to_string, format_numeric, parse_datetime,
    parse_f64, parse_i64,
};
pub use frame::{
    MILLIS_PER_YEAR, count_entities, duplicate_key_count, epoch_millis, integer_column,
    missing_columns, timestamp_column,
};
