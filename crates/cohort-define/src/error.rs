//! Error types for cohort definitions.

use std::path::PathBuf;

use cohort_filter::ChainError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CohortError {
    /// A loader failed to produce its table.
    #[error("failed to load table '{table}': {source}")]
    Load {
        table: String,
        #[source]
        source: PolarsError,
    },

    #[error("table '{table}' is missing column '{column}'")]
    ColumnMissing { table: String, column: String },

    #[error("cache {operation} failed for {path}: {source}")]
    CacheIo {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cohort '{cohort}' has no outcome sources")]
    NoOutcomeSources { cohort: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl CohortError {
    pub(crate) fn cache_io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::CacheIo {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CohortError>;
