//! Calendar bounds on the prediction timestamp.

use chrono::NaiveDateTime;
use cohort_common::epoch_millis;
use polars::prelude::{LazyFrame, col, lit};

use super::epoch_ms;
use crate::error::Result;
use crate::filter::{KeyColumns, PredictionTimeFilter, require_columns};

/// Keep prediction times at or after `min`.
#[derive(Debug, Clone)]
pub struct MinDateFilter {
    min: NaiveDateTime,
    keys: KeyColumns,
}

impl MinDateFilter {
    pub fn new(min: NaiveDateTime) -> Self {
        Self {
            min,
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for MinDateFilter {
    fn name(&self) -> &str {
        "min_date"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let ts = self.keys.timestamp.as_str();
        require_columns(self.name(), &mut table, &[ts])?;
        Ok(table.filter(epoch_millis(col(ts)).gt_eq(lit(epoch_ms(self.min)))))
    }
}

/// Keep prediction times at or before `max`.
#[derive(Debug, Clone)]
pub struct MaxDateFilter {
    max: NaiveDateTime,
    keys: KeyColumns,
}

impl MaxDateFilter {
    pub fn new(max: NaiveDateTime) -> Self {
        Self {
            max,
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for MaxDateFilter {
    fn name(&self) -> &str {
        "max_date"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let ts = self.keys.timestamp.as_str();
        require_columns(self.name(), &mut table, &[ts])?;
        Ok(table.filter(epoch_millis(col(ts)).lt_eq(lit(epoch_ms(self.max)))))
    }
}

/// Drop every prediction time that falls in one calendar year.
#[derive(Debug, Clone)]
pub struct ExcludeYearFilter {
    year: i32,
    name: String,
    keys: KeyColumns,
}

impl ExcludeYearFilter {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            name: format!("exclude_year_{year}"),
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for ExcludeYearFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let ts = self.keys.timestamp.as_str();
        require_columns(&self.name, &mut table, &[ts])?;
        Ok(table.filter(col(ts).dt().year().neq(lit(self.year))))
    }
}
