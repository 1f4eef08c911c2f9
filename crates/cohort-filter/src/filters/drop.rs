//! Removal of helper columns.

use polars::prelude::{Expr, LazyFrame, col};

use crate::error::{FilterError, Result};
use crate::filter::{KeyColumns, PredictionTimeFilter, column_names_except, require_columns};

/// Drop columns attached by earlier steps, such as `age`.
///
/// Never touches rows. Refuses to drop the entity or timestamp column.
#[derive(Debug, Clone)]
pub struct DropColumnsStep {
    columns: Vec<String>,
    keys: KeyColumns,
}

impl DropColumnsStep {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for DropColumnsStep {
    fn name(&self) -> &str {
        "drop_columns"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        if let Some(key) = self.columns.iter().find(|c| self.keys.contains(c)) {
            return Err(FilterError::KeyColumn {
                filter: self.name().to_string(),
                column: key.clone(),
            });
        }
        let dropped: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let schema = require_columns(self.name(), &mut table, &dropped)?;
        let kept: Vec<Expr> = column_names_except(&schema, &dropped)
            .into_iter()
            .map(col)
            .collect();
        Ok(table.select(kept))
    }
}
