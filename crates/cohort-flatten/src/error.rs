//! Error types for flattening.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("prediction-time table is missing column '{column}'")]
    ColumnMissing { column: String },

    #[error("prediction-time table has an invalid {column} in row {row}")]
    InvalidKey { column: String, row: usize },

    #[error("two specs produce the output column '{name}'")]
    DuplicateColumn { name: String },

    #[error("lookbehind/lookahead must be non-negative, got {days} days for '{feature}'")]
    NegativeWindow { feature: String, days: i64 },

    #[error("window of {days} days for '{feature}' is out of range")]
    WindowOutOfRange { feature: String, days: i64 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flatten config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, FlattenError>;
