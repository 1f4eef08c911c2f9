//! Age at prediction time.
//!
//! Age depends on a birthdays side table, so it is split into two steps:
//! [`JoinAgeStep`] attaches an `age` column and [`AgeFilter`] bounds it. An
//! age filter placed before the join fails with `ColumnMissing`.

use cohort_common::{MILLIS_PER_YEAR, epoch_millis};
use cohort_model::columns;
use polars::prelude::{DataType, Expr, JoinArgs, JoinType, LazyFrame, col, lit};

use crate::error::Result;
use crate::filter::{KeyColumns, PredictionTimeFilter, column_names_except, require_columns};

const BIRTH_TMP: &str = "__date_of_birth";

/// Attach `age` (fractional years at the prediction timestamp) from a birthdays table.
///
/// The side table needs `{entity_id, date_of_birth}`; the birthday itself is
/// not kept. Entities without a birthday get a null age. An existing `age`
/// column is replaced.
#[derive(Clone)]
pub struct JoinAgeStep {
    birthdays: LazyFrame,
    birth_col: String,
    keys: KeyColumns,
}

impl JoinAgeStep {
    pub fn new(birthdays: LazyFrame) -> Self {
        Self {
            birthdays,
            birth_col: columns::DATE_OF_BIRTH.to_string(),
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_birth_col(mut self, birth_col: impl Into<String>) -> Self {
        self.birth_col = birth_col.into();
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for JoinAgeStep {
    fn name(&self) -> &str {
        "join_age"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let entity = self.keys.entity_id.as_str();
        let ts = self.keys.timestamp.as_str();
        let schema = require_columns(self.name(), &mut table, &[entity, ts])?;
        let mut birthdays = self.birthdays.clone();
        require_columns(self.name(), &mut birthdays, &[entity, self.birth_col.as_str()])?;

        let births = birthdays.select([col(entity), col(self.birth_col.as_str()).alias(BIRTH_TMP)]);
        let age = ((epoch_millis(col(ts)) - epoch_millis(col(BIRTH_TMP))).cast(DataType::Float64)
            / lit(MILLIS_PER_YEAR))
        .alias(columns::AGE);

        let mut output: Vec<Expr> = column_names_except(&schema, &[columns::AGE])
            .into_iter()
            .map(col)
            .collect();
        output.push(age);

        Ok(table
            .join(
                births,
                [col(entity)],
                [col(entity)],
                JoinArgs::new(JoinType::Left),
            )
            .select(output))
    }
}

/// Keep prediction times whose `age` lies within the optional bounds (inclusive).
#[derive(Debug, Clone)]
pub struct AgeFilter {
    min_age: Option<f64>,
    max_age: Option<f64>,
    name: String,
    age_col: String,
}

impl AgeFilter {
    pub fn new(min_age: Option<f64>, max_age: Option<f64>) -> Self {
        let name = match (min_age, max_age) {
            (Some(_), None) => "min_age",
            (None, Some(_)) => "max_age",
            _ => "age_range",
        };
        Self {
            min_age,
            max_age,
            name: name.to_string(),
            age_col: columns::AGE.to_string(),
        }
    }

    pub fn min(min_age: f64) -> Self {
        Self::new(Some(min_age), None)
    }

    pub fn max(max_age: f64) -> Self {
        Self::new(None, Some(max_age))
    }

    #[must_use]
    pub fn with_age_col(mut self, age_col: impl Into<String>) -> Self {
        self.age_col = age_col.into();
        self
    }
}

impl PredictionTimeFilter for AgeFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let age = self.age_col.as_str();
        require_columns(&self.name, &mut table, &[age])?;

        let lower = self.min_age.map(|min| col(age).gt_eq(lit(min)));
        let upper = self.max_age.map(|max| col(age).lt_eq(lit(max)));
        let predicate = match (lower, upper) {
            (Some(l), Some(u)) => l.and(u),
            (Some(p), None) | (None, Some(p)) => p,
            (None, None) => return Ok(table),
        };
        Ok(table.filter(predicate))
    }
}
