//! Error types for filters, chains and chain configuration.

use std::path::PathBuf;

use cohort_model::StepDelta;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by a single filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter needs a column its input does not have.
    #[error("filter '{filter}' requires column '{column}'")]
    ColumnMissing { filter: String, column: String },

    /// The filter was asked to remove `entity_id` or `timestamp`.
    #[error("filter '{filter}' cannot drop key column '{column}'")]
    KeyColumn { filter: String, column: String },

    /// Polars failed while building or evaluating the filter plan.
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl FilterError {
    pub(crate) fn column_missing(filter: &str, column: &str) -> Self {
        Self::ColumnMissing {
            filter: filter.to_string(),
            column: column.to_string(),
        }
    }
}

/// Errors raised by the filter-chain engine.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The initial table lacks the entity or timestamp column.
    #[error("initial table is missing key column '{column}'")]
    MissingKeyColumn { column: String },

    /// A step failed; the chain stopped there.
    #[error(
        "step {step_index} '{step_name}' failed ({n_rows_before} rows, {n_entities_before} entities before the step): {source}"
    )]
    StepFailed {
        step_index: usize,
        step_name: String,
        n_rows_before: usize,
        n_entities_before: usize,
        /// Trail of the steps that completed before the failure.
        completed: Vec<StepDelta>,
        #[source]
        source: FilterError,
    },

    /// A step produced more rows or entities than it received.
    #[error("step {} '{}' grew the table: {delta}", .delta.step_index, .delta.step_name)]
    TableGrew { delta: StepDelta },

    /// A step removed the entity or timestamp column.
    #[error("step {step_index} '{step_name}' dropped key column '{column}'")]
    KeyColumnDropped {
        step_index: usize,
        step_name: String,
        column: String,
    },

    /// The final table has repeated `(entity, timestamp)` keys.
    #[error("{duplicates} duplicate (entity, timestamp) rows in the filtered table")]
    AmbiguousResult { duplicates: usize },

    /// Counting or materialising outside of a step failed.
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl ChainError {
    /// Steps that completed before the error, when known.
    pub fn completed_steps(&self) -> &[StepDelta] {
        match self {
            Self::StepFailed { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Name of the step responsible for the error, if one is.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step_name, .. } | Self::KeyColumnDropped { step_name, .. } => {
                Some(step_name)
            }
            Self::TableGrew { delta } => Some(&delta.step_name),
            _ => None,
        }
    }
}

/// Errors raised while building filters from names and parameters.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown filter '{name}' (known: {})", known.join(", "))]
    UnknownFilter { name: String, known: Vec<String> },

    #[error("filter '{name}' is already registered")]
    DuplicateFilter { name: String },

    #[error("invalid parameters for filter '{filter}': {source}")]
    InvalidParams {
        filter: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("filter '{filter}' has an out-of-range window of {days} days")]
    WindowOutOfRange { filter: String, days: i64 },

    #[error("filter '{filter}' needs side table '{table}', which was not provided")]
    MissingSideTable { filter: String, table: String },
}

/// Errors raised while loading a chain configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse chain config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, FilterError>;
