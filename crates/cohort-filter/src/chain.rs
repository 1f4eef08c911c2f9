//! Ordered, auditable application of prediction-time filters.
//!
//! [`FilterChain`] folds its filters over the candidate table strictly left
//! to right and records a [`StepDelta`] for every step. The engine never
//! reorders steps; an out-of-order chain surfaces as the failing step's
//! [`FilterError`] wrapped in [`ChainError::StepFailed`].
//!
//! # Example
//!
//! ```ignore
//! use cohort_filter::{FilterChain, filters::{ExcludeYearFilter, MinDateFilter}};
//!
//! let bundle = FilterChain::new("entity_id")
//!     .add_filter(MinDateFilter::new(min))
//!     .add_filter(ExcludeYearFilter::new(2019))
//!     .run(candidates)?;
//! println!("{}", bundle.flow_chart());
//! ```

use cohort_common::{any_to_i64, count_entities, duplicate_key_count};
use cohort_model::{FilteredPredictionTimeBundle, StepDelta, columns};
use polars::prelude::{DataFrame, IntoLazy, LazyFrame, PolarsResult, Schema, col, len};
use tracing::{debug, info, info_span, warn};

use crate::error::{ChainError, FilterError};
use crate::filter::{KeyColumns, PredictionTimeFilter};

/// An ordered sequence of filters plus the key columns they operate on.
pub struct FilterChain {
    keys: KeyColumns,
    filters: Vec<Box<dyn PredictionTimeFilter>>,
    allow_duplicate_keys: bool,
}

impl FilterChain {
    /// Create an empty chain counting entities in `entity_id_col`.
    pub fn new(entity_id_col: impl Into<String>) -> Self {
        Self {
            keys: KeyColumns::new(entity_id_col, columns::TIMESTAMP),
            filters: Vec::new(),
            allow_duplicate_keys: false,
        }
    }

    #[must_use]
    pub fn with_timestamp_col(mut self, timestamp_col: impl Into<String>) -> Self {
        self.keys.timestamp = timestamp_col.into();
        self
    }

    /// Append a filter.
    #[must_use]
    pub fn add_filter(mut self, filter: impl PredictionTimeFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Append an already boxed filter.
    #[must_use]
    pub fn add_boxed(mut self, filter: Box<dyn PredictionTimeFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Accept repeated `(entity, timestamp)` rows in the final table.
    #[must_use]
    pub fn allow_duplicate_keys(mut self) -> Self {
        self.allow_duplicate_keys = true;
        self
    }

    pub fn keys(&self) -> &KeyColumns {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Step names in application order.
    pub fn step_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter, materialising and counting after each step.
    ///
    /// # Errors
    ///
    /// Fails on the first step that errors, grows the table or drops a key
    /// column, and when the final table has duplicate keys (unless allowed).
    pub fn run(&self, initial: DataFrame) -> Result<FilteredPredictionTimeBundle, ChainError> {
        let entity = self.keys.entity_id.as_str();
        self.check_keys_present(initial.schema())?;

        let span = info_span!("filter_chain", steps = self.filters.len());
        let _guard = span.enter();

        let mut current = initial;
        let mut n_rows = current.height();
        let mut n_entities = count_entities(&current, entity)?;
        info!(rows = n_rows, entities = n_entities, "running filter chain");

        let mut steps: Vec<StepDelta> = Vec::with_capacity(self.filters.len());
        for (step_index, filter) in self.filters.iter().enumerate() {
            let step_span = info_span!("filter_step", step_index, step_name = filter.name());
            let _step_guard = step_span.enter();

            let next = match filter
                .apply(current.lazy())
                .and_then(|plan| plan.collect().map_err(FilterError::from))
            {
                Ok(next) => next,
                Err(source) => {
                    return Err(ChainError::StepFailed {
                        step_index,
                        step_name: filter.name().to_string(),
                        n_rows_before: n_rows,
                        n_entities_before: n_entities,
                        completed: steps,
                        source,
                    });
                }
            };
            self.check_keys_kept(step_index, filter.name(), next.schema())?;

            let delta = StepDelta {
                step_name: filter.name().to_string(),
                step_index,
                n_rows_before: n_rows,
                n_rows_after: next.height(),
                n_entities_before: n_entities,
                n_entities_after: count_entities(&next, entity)?,
            };
            record_step(&delta)?;

            n_rows = delta.n_rows_after;
            n_entities = delta.n_entities_after;
            steps.push(delta);
            current = next;
        }

        self.check_unique_keys(&current)?;
        info!(rows = n_rows, entities = n_entities, "filter chain finished");
        Ok(FilteredPredictionTimeBundle::new(current, steps))
    }

    /// Build the whole chain as one lazy plan without materialising intermediates.
    ///
    /// Counting happens only when [`LazyChainRun::step_deltas`] or
    /// [`LazyChainRun::into_bundle`] is called. A step that fails while the
    /// plan is being built is reported with counts computed at that point.
    pub fn run_lazy(&self, initial: LazyFrame) -> Result<LazyChainRun, ChainError> {
        let mut initial = initial;
        let schema = initial.collect_schema()?;
        self.check_keys_present(&schema)?;

        let mut stages = vec![initial];
        let mut names = Vec::with_capacity(self.filters.len());
        for (step_index, filter) in self.filters.iter().enumerate() {
            let previous = stages[stages.len() - 1].clone();
            let mut next = match filter.apply(previous) {
                Ok(next) => next,
                Err(source) => {
                    let partial = LazyChainRun {
                        keys: self.keys.clone(),
                        stages,
                        names,
                        allow_duplicate_keys: self.allow_duplicate_keys,
                    };
                    let completed = partial.step_deltas()?;
                    let (n_rows_before, n_entities_before) = partial.stage_counts(step_index)?;
                    return Err(ChainError::StepFailed {
                        step_index,
                        step_name: filter.name().to_string(),
                        n_rows_before,
                        n_entities_before,
                        completed,
                        source,
                    });
                }
            };
            let schema = next.collect_schema()?;
            self.check_keys_kept(step_index, filter.name(), &schema)?;
            names.push(filter.name().to_string());
            stages.push(next);
        }

        Ok(LazyChainRun {
            keys: self.keys.clone(),
            stages,
            names,
            allow_duplicate_keys: self.allow_duplicate_keys,
        })
    }

    fn check_keys_present(&self, schema: &Schema) -> Result<(), ChainError> {
        for column in [&self.keys.entity_id, &self.keys.timestamp] {
            if !schema.contains(column) {
                return Err(ChainError::MissingKeyColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_keys_kept(
        &self,
        step_index: usize,
        step_name: &str,
        schema: &Schema,
    ) -> Result<(), ChainError> {
        for column in [&self.keys.entity_id, &self.keys.timestamp] {
            if !schema.contains(column) {
                return Err(ChainError::KeyColumnDropped {
                    step_index,
                    step_name: step_name.to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_unique_keys(&self, table: &DataFrame) -> Result<(), ChainError> {
        check_unique_keys(&self.keys, self.allow_duplicate_keys, table)
    }
}

fn check_unique_keys(
    keys: &KeyColumns,
    allow_duplicate_keys: bool,
    table: &DataFrame,
) -> Result<(), ChainError> {
    if allow_duplicate_keys {
        return Ok(());
    }
    let duplicates = duplicate_key_count(table, &keys.entity_id, &keys.timestamp)?;
    if duplicates > 0 {
        return Err(ChainError::AmbiguousResult { duplicates });
    }
    Ok(())
}

fn record_step(delta: &StepDelta) -> Result<(), ChainError> {
    debug!(
        rows_before = delta.n_rows_before,
        rows_after = delta.n_rows_after,
        entities_before = delta.n_entities_before,
        entities_after = delta.n_entities_after,
        "step applied"
    );
    if !delta.is_monotonic() {
        return Err(ChainError::TableGrew {
            delta: delta.clone(),
        });
    }
    if delta.is_empty_result() {
        warn!(step = %delta.step_name, "filter step left no prediction times");
    }
    Ok(())
}

/// A chain built as lazy plans, one per stage.
///
/// Stage 0 is the initial table; stage `i + 1` is the output of step `i`.
pub struct LazyChainRun {
    keys: KeyColumns,
    stages: Vec<LazyFrame>,
    names: Vec<String>,
    allow_duplicate_keys: bool,
}

impl LazyChainRun {
    /// The plan of the final table.
    pub fn final_table(&self) -> LazyFrame {
        self.stages[self.stages.len() - 1].clone()
    }

    /// Count every stage and return the step trail.
    pub fn step_deltas(&self) -> Result<Vec<StepDelta>, ChainError> {
        let mut counts = Vec::with_capacity(self.stages.len());
        for index in 0..self.stages.len() {
            counts.push(self.stage_counts(index)?);
        }

        let mut steps = Vec::with_capacity(self.names.len());
        for (step_index, name) in self.names.iter().enumerate() {
            let (n_rows_before, n_entities_before) = counts[step_index];
            let (n_rows_after, n_entities_after) = counts[step_index + 1];
            let delta = StepDelta {
                step_name: name.clone(),
                step_index,
                n_rows_before,
                n_rows_after,
                n_entities_before,
                n_entities_after,
            };
            record_step(&delta)?;
            steps.push(delta);
        }
        Ok(steps)
    }

    /// Materialise the final table together with its trail.
    pub fn into_bundle(self) -> Result<FilteredPredictionTimeBundle, ChainError> {
        let steps = self.step_deltas()?;
        let table = self.final_table().collect()?;
        check_unique_keys(&self.keys, self.allow_duplicate_keys, &table)?;
        Ok(FilteredPredictionTimeBundle::new(table, steps))
    }

    fn stage_counts(&self, index: usize) -> PolarsResult<(usize, usize)> {
        let entity = self.keys.entity_id.as_str();
        let counts = self.stages[index]
            .clone()
            .select([
                len().alias("n_rows"),
                col(entity).n_unique().alias("n_entities"),
            ])
            .collect()?;
        let read = |name: &str| -> PolarsResult<usize> {
            let value = counts.column(name)?.get(0)?;
            Ok(any_to_i64(value).map_or(0, |v| usize::try_from(v).unwrap_or(0)))
        };
        Ok((read("n_rows")?, read("n_entities")?))
    }
}

/// Run `filters` over `initial` in order, counting entities in `entity_id_col`.
pub fn filter_prediction_times(
    initial: DataFrame,
    filters: Vec<Box<dyn PredictionTimeFilter>>,
    entity_id_col: &str,
) -> Result<FilteredPredictionTimeBundle, ChainError> {
    filters
        .into_iter()
        .fold(FilterChain::new(entity_id_col), FilterChain::add_boxed)
        .run(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FnFilter;
    use crate::filters::test_support::{keyed, ts};
    use polars::prelude::{IntoLazy, lit};

    #[test]
    fn empty_chain_returns_input_and_empty_trail() {
        let table = keyed(&[1, 2], &[ts(2020, 1, 1), ts(2020, 1, 2)]);
        let bundle = FilterChain::new("entity_id").run(table).unwrap();
        assert_eq!(bundle.n_rows(), 2);
        assert!(bundle.filter_steps.is_empty());
    }

    #[test]
    fn missing_key_column_is_rejected_up_front() {
        let table = keyed(&[1], &[ts(2020, 1, 1)]);
        let err = FilterChain::new("patient_id").run(table).unwrap_err();
        assert!(matches!(err, ChainError::MissingKeyColumn { ref column } if column == "patient_id"));
    }

    #[test]
    fn growing_step_is_rejected() {
        let doubling = FnFilter::new("doubling", |lf: LazyFrame| {
            Ok(polars::prelude::concat([lf.clone(), lf], Default::default())?)
        });
        let table = keyed(&[1, 2], &[ts(2020, 1, 1), ts(2020, 1, 2)]);
        let err = FilterChain::new("entity_id")
            .add_filter(doubling)
            .run(table)
            .unwrap_err();
        match err {
            ChainError::TableGrew { delta } => {
                assert_eq!(delta.n_rows_before, 2);
                assert_eq!(delta.n_rows_after, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dropping_a_key_column_is_rejected() {
        let drop_ts = FnFilter::new("drop_ts", |lf: LazyFrame| {
            Ok(lf.select([polars::prelude::col("entity_id")]))
        });
        let table = keyed(&[1], &[ts(2020, 1, 1)]);
        let err = FilterChain::new("entity_id")
            .add_filter(drop_ts)
            .run(table)
            .unwrap_err();
        assert!(matches!(err, ChainError::KeyColumnDropped { step_index: 0, ref column, .. } if column == "timestamp"));
    }

    #[test]
    fn duplicate_keys_are_ambiguous_unless_allowed() {
        let table = keyed(&[1, 1, 2], &[ts(2020, 1, 1), ts(2020, 1, 1), ts(2020, 1, 2)]);
        let err = FilterChain::new("entity_id").run(table.clone()).unwrap_err();
        assert!(matches!(err, ChainError::AmbiguousResult { duplicates: 1 }));

        let bundle = FilterChain::new("entity_id")
            .allow_duplicate_keys()
            .run(table)
            .unwrap();
        assert_eq!(bundle.n_rows(), 3);
    }

    #[test]
    fn lazy_bundle_rejects_duplicate_keys_unless_allowed() {
        let recent = FnFilter::new("recent", |lf: LazyFrame| {
            Ok(lf.filter(polars::prelude::col("entity_id").lt(lit(3i64))))
        });
        let table = keyed(
            &[1, 1, 2, 3],
            &[ts(2020, 1, 1), ts(2020, 1, 1), ts(2020, 1, 2), ts(2020, 1, 3)],
        );
        let chain = FilterChain::new("entity_id").add_filter(recent);

        let run = chain.run_lazy(table.clone().lazy()).unwrap();
        assert_eq!(run.step_deltas().unwrap()[0].n_rows_after, 3);
        let err = run.into_bundle().err().unwrap();
        assert!(matches!(err, ChainError::AmbiguousResult { duplicates: 1 }));

        let bundle = chain
            .allow_duplicate_keys()
            .run_lazy(table.lazy())
            .unwrap()
            .into_bundle()
            .unwrap();
        assert_eq!(bundle.n_rows(), 3);
    }

    #[test]
    fn emptying_step_is_recorded_not_raised() {
        let none = FnFilter::new("none", |lf: LazyFrame| Ok(lf.filter(lit(false))));
        let table = keyed(&[1, 2], &[ts(2020, 1, 1), ts(2020, 1, 2)]);
        let bundle = FilterChain::new("entity_id").add_filter(none).run(table).unwrap();
        assert_eq!(bundle.n_rows(), 0);
        assert_eq!(bundle.empty_steps().count(), 1);
        assert_eq!(bundle.filter_steps[0].n_entities_after, 0);
    }

    #[test]
    fn lazy_run_defers_counting() {
        let keep_first = FnFilter::new("entity_1", |lf: LazyFrame| {
            Ok(lf.filter(polars::prelude::col("entity_id").eq(lit(1i64))))
        });
        let table = keyed(&[1, 1, 2], &[ts(2020, 1, 1), ts(2020, 1, 2), ts(2020, 1, 3)]);
        let chain = FilterChain::new("entity_id").add_filter(keep_first);

        let run = chain.run_lazy(table.lazy()).unwrap();
        let final_rows = run.final_table().collect().unwrap().height();
        assert_eq!(final_rows, 2);

        let steps = run.step_deltas().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].n_rows_before, 3);
        assert_eq!(steps[0].n_entities_after, 1);

        let bundle = run.into_bundle().unwrap();
        assert_eq!(bundle.n_rows(), 2);
    }
}
