//! Filters over arbitrary attached columns (admission type, unit, location code).

use polars::prelude::{Expr, LazyFrame, col, lit};
use serde::Deserialize;

use crate::error::Result;
use crate::filter::{PredictionTimeFilter, require_columns};

/// Whether matching rows are kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Keep,
    Drop,
}

impl Selection {
    fn apply(self, table: LazyFrame, matches: Expr) -> LazyFrame {
        match self {
            Self::Keep => table.filter(matches),
            // rows with a null in the column are kept when dropping matches
            Self::Drop => table.filter(matches.fill_null(lit(false)).not()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Drop => "drop",
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ColumnValue {
    fn to_lit(&self) -> Expr {
        match self {
            Self::Bool(v) => lit(*v),
            Self::Int(v) => lit(*v),
            Self::Float(v) => lit(*v),
            Self::Text(v) => lit(v.clone()),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

fn any_of(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    exprs
        .into_iter()
        .reduce(|acc, e| acc.or(e))
        .unwrap_or_else(|| lit(false))
}

/// Keep (or drop) rows whose column equals one of `values`.
#[derive(Debug, Clone)]
pub struct ColumnValueFilter {
    column: String,
    values: Vec<ColumnValue>,
    selection: Selection,
    name: String,
}

impl ColumnValueFilter {
    pub fn keep<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ColumnValue>,
    {
        Self::new(column, values, Selection::Keep)
    }

    pub fn exclude<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ColumnValue>,
    {
        Self::new(column, values, Selection::Drop)
    }

    pub fn new<I, V>(column: impl Into<String>, values: I, selection: Selection) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ColumnValue>,
    {
        let column = column.into();
        Self {
            name: format!("{}_{column}_values", selection.label()),
            column,
            values: values.into_iter().map(Into::into).collect(),
            selection,
        }
    }
}

impl PredictionTimeFilter for ColumnValueFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let column = self.column.as_str();
        require_columns(&self.name, &mut table, &[column])?;
        let matches = any_of(self.values.iter().map(|v| col(column).eq(v.to_lit())));
        Ok(self.selection.apply(table, matches))
    }
}

/// Keep (or drop) rows whose string column starts with one of `prefixes`.
#[derive(Debug, Clone)]
pub struct ColumnPrefixFilter {
    column: String,
    prefixes: Vec<String>,
    selection: Selection,
    name: String,
}

impl ColumnPrefixFilter {
    pub fn new<I, S>(column: impl Into<String>, prefixes: I, selection: Selection) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let column = column.into();
        Self {
            name: format!("{}_{column}_prefixes", selection.label()),
            column,
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            selection,
        }
    }
}

impl PredictionTimeFilter for ColumnPrefixFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let column = self.column.as_str();
        require_columns(&self.name, &mut table, &[column])?;
        let matches = any_of(
            self.prefixes
                .iter()
                .map(|p| col(column).str().starts_with(lit(p.clone()))),
        );
        Ok(self.selection.apply(table, matches))
    }
}

/// Keep rows satisfying an arbitrary boolean expression.
///
/// `columns` lists what the expression reads so a misplaced step fails
/// with `ColumnMissing` before the query runs.
#[derive(Debug, Clone)]
pub struct ColumnPredicateFilter {
    name: String,
    columns: Vec<String>,
    predicate: Expr,
}

impl ColumnPredicateFilter {
    pub fn new<I, S>(name: impl Into<String>, columns: I, predicate: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            predicate,
        }
    }
}

impl PredictionTimeFilter for ColumnPredicateFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let required: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        require_columns(&self.name, &mut table, &required)?;
        Ok(table.filter(self.predicate.clone()))
    }
}
