//! Name → factory lookup for building filters from configuration.
//!
//! The registry is an explicit value: build it once (usually with
//! [`default_registry`]), add project-specific factories, and pass it to
//! whatever composes chains from configuration.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use cohort_model::columns;
use polars::prelude::LazyFrame;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::RegistryError;
use crate::filter::{KeyColumns, NamedFilter, PredictionTimeFilter};
use crate::filters::{
    AgeFilter, ColumnPrefixFilter, ColumnValue, ColumnValueFilter, DropColumnsStep,
    ExcludeYearFilter, JoinAgeStep, MaxDateFilter, MinDateFilter, NoIncidentOutcomeFilter,
    QuarantineFilter, Selection, WithoutPrevalentOutcomeFilter,
};

/// One configured step: the registered filter name and its parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepParams {
    pub filter: String,
    /// Step name override for the flow chart.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub params: toml::Table,
}

impl StepParams {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            name: None,
            params: toml::Table::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Deserialize the parameters into a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, RegistryError> {
        toml::Value::Table(self.params.clone())
            .try_into()
            .map_err(|source| RegistryError::InvalidParams {
                filter: self.filter.clone(),
                source,
            })
    }
}

/// Named side tables available to factories (birthdays, quarantine events, outcomes).
#[derive(Clone, Default)]
pub struct SideTables {
    tables: HashMap<String, LazyFrame>,
}

impl SideTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: LazyFrame) {
        self.tables.insert(name.into(), table);
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, table: LazyFrame) -> Self {
        self.insert(name, table);
        self
    }

    pub fn get(&self, filter: &str, name: &str) -> Result<LazyFrame, RegistryError> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MissingSideTable {
                filter: filter.to_string(),
                table: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// What a factory may read besides its own parameters.
pub struct FilterContext<'a> {
    pub keys: &'a KeyColumns,
    pub side_tables: &'a SideTables,
}

/// Builds one filter from its parameters.
pub type FilterFactory =
    fn(&StepParams, &FilterContext<'_>) -> Result<Box<dyn PredictionTimeFilter>, RegistryError>;

/// Registered filter factories, by name.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a new name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: FilterFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateFilter { name });
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the filter for one configured step.
    pub fn build(
        &self,
        step: &StepParams,
        ctx: &FilterContext<'_>,
    ) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
        let factory =
            self.factories
                .get(&step.filter)
                .ok_or_else(|| RegistryError::UnknownFilter {
                    name: step.filter.clone(),
                    known: self.factories.keys().cloned().collect(),
                })?;
        let filter = factory(step, ctx)?;
        Ok(match &step.name {
            Some(name) => Box::new(NamedFilter::new(name.clone(), filter)),
            None => filter,
        })
    }
}

/// Registry with every generic filter of this crate.
pub fn default_registry() -> FilterRegistry {
    let builtin: [(&str, FilterFactory); 11] = [
        ("min_date", build_min_date),
        ("max_date", build_max_date),
        ("exclude_year", build_exclude_year),
        ("join_age", build_join_age),
        ("age", build_age),
        ("quarantine", build_quarantine),
        ("no_incident_outcome", build_no_incident_outcome),
        ("without_prevalent_outcome", build_without_prevalent_outcome),
        ("column_values", build_column_values),
        ("column_prefixes", build_column_prefixes),
        ("drop_columns", build_drop_columns),
    ];
    let mut registry = FilterRegistry::new();
    for (name, factory) in builtin {
        registry.factories.insert(name.to_string(), factory);
    }
    registry
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DateParams {
    date: NaiveDate,
}

fn build_min_date(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: DateParams = step.parse()?;
    Ok(Box::new(
        MinDateFilter::new(midnight(p.date)).with_keys(ctx.keys.clone()),
    ))
}

fn build_max_date(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: DateParams = step.parse()?;
    Ok(Box::new(
        MaxDateFilter::new(midnight(p.date)).with_keys(ctx.keys.clone()),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct YearParams {
    year: i32,
}

fn build_exclude_year(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: YearParams = step.parse()?;
    Ok(Box::new(
        ExcludeYearFilter::new(p.year).with_keys(ctx.keys.clone()),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JoinAgeParams {
    side_table: String,
    #[serde(default)]
    birth_col: Option<String>,
}

fn build_join_age(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: JoinAgeParams = step.parse()?;
    let birthdays = ctx.side_tables.get(&step.filter, &p.side_table)?;
    Ok(Box::new(
        JoinAgeStep::new(birthdays)
            .with_birth_col(p.birth_col.unwrap_or_else(|| columns::DATE_OF_BIRTH.to_string()))
            .with_keys(ctx.keys.clone()),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgeParams {
    #[serde(default)]
    min_age: Option<f64>,
    #[serde(default)]
    max_age: Option<f64>,
}

fn build_age(
    step: &StepParams,
    _ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: AgeParams = step.parse()?;
    Ok(Box::new(AgeFilter::new(p.min_age, p.max_age)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct QuarantineParams {
    side_table: String,
    days: i64,
    #[serde(default)]
    timestamp_col: Option<String>,
}

fn build_quarantine(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: QuarantineParams = step.parse()?;
    let events = ctx.side_tables.get(&step.filter, &p.side_table)?;
    let window = TimeDelta::try_days(p.days).ok_or_else(|| RegistryError::WindowOutOfRange {
        filter: step.filter.clone(),
        days: p.days,
    })?;
    let mut filter = QuarantineFilter::new(events, window)
        .with_name(format!("quarantine_{}", p.side_table))
        .with_keys(ctx.keys.clone());
    if let Some(column) = p.timestamp_col {
        filter = filter.with_quarantine_timestamp_col(column);
    }
    Ok(Box::new(filter))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IncidentParams {
    side_table: String,
    #[serde(default)]
    timestamp_col: Option<String>,
}

fn build_no_incident_outcome(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: IncidentParams = step.parse()?;
    let outcomes = ctx.side_tables.get(&step.filter, &p.side_table)?;
    let mut filter = NoIncidentOutcomeFilter::new(outcomes).with_keys(ctx.keys.clone());
    if let Some(column) = p.timestamp_col {
        filter = filter.with_outcome_timestamp_col(column);
    }
    Ok(Box::new(filter))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PrevalentParams {
    side_table: String,
    washout_end: NaiveDate,
    #[serde(default)]
    timestamp_col: Option<String>,
}

fn build_without_prevalent_outcome(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: PrevalentParams = step.parse()?;
    let outcomes = ctx.side_tables.get(&step.filter, &p.side_table)?;
    let mut filter = WithoutPrevalentOutcomeFilter::new(outcomes, midnight(p.washout_end))
        .with_keys(ctx.keys.clone());
    if let Some(column) = p.timestamp_col {
        filter = filter.with_outcome_timestamp_col(column);
    }
    Ok(Box::new(filter))
}

fn selection(exclude: bool) -> Selection {
    if exclude { Selection::Drop } else { Selection::Keep }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnValuesParams {
    column: String,
    values: Vec<ColumnValue>,
    #[serde(default)]
    exclude: bool,
}

fn build_column_values(
    step: &StepParams,
    _ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: ColumnValuesParams = step.parse()?;
    Ok(Box::new(ColumnValueFilter::new(
        p.column,
        p.values,
        selection(p.exclude),
    )))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnPrefixesParams {
    column: String,
    prefixes: Vec<String>,
    #[serde(default)]
    exclude: bool,
}

fn build_column_prefixes(
    step: &StepParams,
    _ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: ColumnPrefixesParams = step.parse()?;
    Ok(Box::new(ColumnPrefixFilter::new(
        p.column,
        p.prefixes,
        selection(p.exclude),
    )))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DropColumnsParams {
    columns: Vec<String>,
}

fn build_drop_columns(
    step: &StepParams,
    ctx: &FilterContext<'_>,
) -> Result<Box<dyn PredictionTimeFilter>, RegistryError> {
    let p: DropColumnsParams = step.parse()?;
    Ok(Box::new(
        DropColumnsStep::new(p.columns).with_keys(ctx.keys.clone()),
    ))
}
