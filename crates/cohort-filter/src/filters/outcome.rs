//! Filters relative to the outcome of interest.

use chrono::NaiveDateTime;
use cohort_common::epoch_millis;
use cohort_model::columns;
use polars::prelude::{Expr, JoinArgs, JoinType, LazyFrame, col, lit};

use super::epoch_ms;
use crate::error::Result;
use crate::filter::{KeyColumns, PredictionTimeFilter, column_names_except, require_columns};

const FIRST_OUTCOME_TMP: &str = "__first_outcome";

/// Drop prediction times at or after the entity's first outcome.
///
/// Entities without any outcome keep all their rows.
#[derive(Clone)]
pub struct NoIncidentOutcomeFilter {
    outcomes: LazyFrame,
    outcome_ts_col: String,
    keys: KeyColumns,
}

impl NoIncidentOutcomeFilter {
    /// `outcomes` holds `{entity_id, timestamp}` of outcome occurrences.
    pub fn new(outcomes: LazyFrame) -> Self {
        Self {
            outcomes,
            outcome_ts_col: columns::TIMESTAMP.to_string(),
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_outcome_timestamp_col(mut self, column: impl Into<String>) -> Self {
        self.outcome_ts_col = column.into();
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for NoIncidentOutcomeFilter {
    fn name(&self) -> &str {
        "no_incident_outcome"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let entity = self.keys.entity_id.as_str();
        let ts = self.keys.timestamp.as_str();
        let schema = require_columns(self.name(), &mut table, &[entity, ts])?;
        let mut outcomes = self.outcomes.clone();
        require_columns(
            self.name(),
            &mut outcomes,
            &[entity, self.outcome_ts_col.as_str()],
        )?;

        let first = outcomes
            .group_by([col(entity)])
            .agg([epoch_millis(col(self.outcome_ts_col.as_str()))
                .min()
                .alias(FIRST_OUTCOME_TMP)]);
        let before_outcome = col(FIRST_OUTCOME_TMP)
            .is_null()
            .or(epoch_millis(col(ts)).lt(col(FIRST_OUTCOME_TMP)));
        let output: Vec<Expr> = column_names_except(&schema, &[])
            .into_iter()
            .map(col)
            .collect();

        Ok(table
            .join(
                first,
                [col(entity)],
                [col(entity)],
                JoinArgs::new(JoinType::Left),
            )
            .filter(before_outcome)
            .select(output))
    }
}

/// Drop every row of entities whose first outcome is on or before `washout_end`.
///
/// Removes prevalent cases: entities that already had the outcome when the
/// observation window opened.
#[derive(Clone)]
pub struct WithoutPrevalentOutcomeFilter {
    outcomes: LazyFrame,
    washout_end: NaiveDateTime,
    outcome_ts_col: String,
    keys: KeyColumns,
}

impl WithoutPrevalentOutcomeFilter {
    pub fn new(outcomes: LazyFrame, washout_end: NaiveDateTime) -> Self {
        Self {
            outcomes,
            washout_end,
            outcome_ts_col: columns::TIMESTAMP.to_string(),
            keys: KeyColumns::default(),
        }
    }

    #[must_use]
    pub fn with_outcome_timestamp_col(mut self, column: impl Into<String>) -> Self {
        self.outcome_ts_col = column.into();
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for WithoutPrevalentOutcomeFilter {
    fn name(&self) -> &str {
        "without_prevalent_outcome"
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let entity = self.keys.entity_id.as_str();
        require_columns(self.name(), &mut table, &[entity])?;
        let mut outcomes = self.outcomes.clone();
        require_columns(
            self.name(),
            &mut outcomes,
            &[entity, self.outcome_ts_col.as_str()],
        )?;

        let prevalent = outcomes
            .filter(
                epoch_millis(col(self.outcome_ts_col.as_str()))
                    .lt_eq(lit(epoch_ms(self.washout_end))),
            )
            .select([col(entity)]);

        Ok(table.join(
            prevalent,
            [col(entity)],
            [col(entity)],
            JoinArgs::new(JoinType::Anti),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_support::{keyed, pairs, ts};
    use polars::prelude::IntoLazy;

    fn outcomes() -> LazyFrame {
        // entity 1 twice, entity 2 once, entity 3 never
        keyed(
            &[1, 1, 2],
            &[ts(2018, 5, 1), ts(2016, 3, 1), ts(2020, 1, 1)],
        )
        .lazy()
    }

    fn candidates() -> LazyFrame {
        keyed(
            &[1, 1, 2, 2, 2, 3],
            &[
                ts(2015, 1, 1),
                ts(2016, 3, 1),
                ts(2019, 1, 1),
                ts(2020, 1, 1),
                ts(2021, 1, 1),
                ts(2021, 1, 1),
            ],
        )
        .lazy()
    }

    #[test]
    fn keeps_rows_strictly_before_first_outcome() {
        let out = NoIncidentOutcomeFilter::new(outcomes())
            .apply(candidates())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(
            pairs(&out),
            vec![(1, ts(2015, 1, 1)), (2, ts(2019, 1, 1)), (3, ts(2021, 1, 1))]
        );
        assert_eq!(out.width(), 2);
    }

    #[test]
    fn removes_prevalent_entities_entirely() {
        let out = WithoutPrevalentOutcomeFilter::new(outcomes(), ts(2017, 1, 1))
            .apply(candidates())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(
            pairs(&out),
            vec![
                (2, ts(2019, 1, 1)),
                (2, ts(2020, 1, 1)),
                (2, ts(2021, 1, 1)),
                (3, ts(2021, 1, 1)),
            ]
        );
    }

    #[test]
    fn washout_end_is_inclusive() {
        let out = WithoutPrevalentOutcomeFilter::new(outcomes(), ts(2020, 1, 1))
            .apply(candidates())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(pairs(&out), vec![(3, ts(2021, 1, 1))]);
    }
}
