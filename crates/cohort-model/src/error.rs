//! Error types for model persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while persisting or restoring model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// File I/O error.
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Step trail could not be (de)serialized.
    #[error("invalid step trail {path}: {source}")]
    StepTrail {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Table could not be written or read.
    #[error("table operation failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl ModelError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
