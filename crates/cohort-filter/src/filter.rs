//! The prediction-time filter interface.
//!
//! A filter receives the current candidate table as a Polars [`LazyFrame`]
//! and returns a narrowed plan. Filters never mutate their input and hold no
//! state besides their parameters and injected side tables, so every concrete
//! filter is a small value type (or a closure wrapped in [`FnFilter`]).
//!
//! Required columns are checked at the start of [`PredictionTimeFilter::apply`]
//! with [`require_columns`], which makes an out-of-order chain fail at the
//! offending step instead of deep inside a query.

use cohort_common::missing_columns;
use cohort_model::columns;
use polars::prelude::{LazyFrame, PlSmallStr, Schema, SchemaRef};

use crate::error::{FilterError, Result};

/// A single step of a filter chain.
pub trait PredictionTimeFilter: Send + Sync {
    /// Step name recorded in the flow chart.
    fn name(&self) -> &str;

    /// Narrow the candidate table.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::ColumnMissing`] when a required column is absent.
    fn apply(&self, table: LazyFrame) -> Result<LazyFrame>;
}

impl<F: PredictionTimeFilter + ?Sized> PredictionTimeFilter for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(&self, table: LazyFrame) -> Result<LazyFrame> {
        (**self).apply(table)
    }
}

/// Names of the entity and timestamp columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumns {
    pub entity_id: String,
    pub timestamp: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            entity_id: columns::ENTITY_ID.to_string(),
            timestamp: columns::TIMESTAMP.to_string(),
        }
    }
}

impl KeyColumns {
    pub fn new(entity_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entity_id == column || self.timestamp == column
    }
}

/// Resolve the plan's schema and fail on the first column it lacks.
pub fn require_columns(
    filter: &str,
    table: &mut LazyFrame,
    required: &[&str],
) -> Result<SchemaRef> {
    let schema = table.collect_schema()?;
    if let Some(missing) = missing_columns(&schema, required).first() {
        return Err(FilterError::column_missing(filter, missing));
    }
    Ok(schema)
}

/// Column names of a schema, in order, skipping `except`.
pub(crate) fn column_names_except(schema: &Schema, except: &[&str]) -> Vec<PlSmallStr> {
    schema
        .iter_names()
        .filter(|name| !except.contains(&name.as_str()))
        .cloned()
        .collect()
}

/// A filter backed by a closure.
///
/// ```
/// use cohort_filter::{FnFilter, PredictionTimeFilter};
/// use polars::prelude::*;
///
/// let positive = FnFilter::new("positive_value", |lf: LazyFrame| {
///     Ok(lf.filter(col("value").gt(lit(0))))
/// })
/// .requires(["value"]);
/// assert_eq!(positive.name(), "positive_value");
/// ```
pub struct FnFilter<F> {
    name: String,
    required: Vec<String>,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(LazyFrame) -> Result<LazyFrame> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            func,
        }
    }

    /// Columns checked before the closure runs.
    #[must_use]
    pub fn requires<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(columns.into_iter().map(Into::into));
        self
    }
}

impl<F> PredictionTimeFilter for FnFilter<F>
where
    F: Fn(LazyFrame) -> Result<LazyFrame> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        if !self.required.is_empty() {
            let required: Vec<&str> = self.required.iter().map(String::as_str).collect();
            require_columns(&self.name, &mut table, &required)?;
        }
        (self.func)(table)
    }
}

/// Wraps a filter under a different step name.
pub struct NamedFilter {
    name: String,
    inner: Box<dyn PredictionTimeFilter>,
}

impl NamedFilter {
    pub fn new(name: impl Into<String>, inner: Box<dyn PredictionTimeFilter>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl PredictionTimeFilter for NamedFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, table: LazyFrame) -> Result<LazyFrame> {
        self.inner.apply(table)
    }
}
