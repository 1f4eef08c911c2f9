//! Error types for timeline construction.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    /// An event handed to a timeline belongs to another entity.
    #[error("timeline of entity {expected} received an event of entity {found}")]
    EntityMismatch { expected: i64, found: i64 },

    /// An input table lacks a required column.
    #[error("{table} table is missing column '{column}'")]
    ColumnMissing { table: &'static str, column: String },

    /// A key cell (entity or timestamp) is null or unparseable.
    #[error("{table} table has an invalid {column} in row {row}")]
    InvalidKey {
        table: &'static str,
        column: String,
        row: usize,
    },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
