//! Washout around quarantine events.

use chrono::TimeDelta;
use cohort_common::epoch_millis;
use polars::prelude::{JoinArgs, JoinType, LazyFrame, col, lit};

use crate::error::Result;
use crate::filter::{KeyColumns, PredictionTimeFilter, require_columns};

const QUARANTINE_TMP: &str = "__quarantine_timestamp";

/// Drop prediction times that fall shortly after a quarantine event.
///
/// A prediction time `t` of entity `e` is removed when some quarantine
/// event `q` of `e` satisfies `q < t < q + interval`. Typical quarantine
/// events are moves into the catchment area or earlier occurrences of the
/// outcome.
///
/// Matches are computed on a separate `(entity, timestamp)` table and
/// removed with an anti-join, so any number of quarantine events per
/// entity leaves the row count of the candidate table untouched.
#[derive(Clone)]
pub struct QuarantineFilter {
    quarantine: LazyFrame,
    interval: TimeDelta,
    quarantine_ts_col: String,
    name: String,
    keys: KeyColumns,
}

impl QuarantineFilter {
    /// `quarantine` holds `{entity_id, timestamp}` of the triggering events.
    pub fn new(quarantine: LazyFrame, interval: TimeDelta) -> Self {
        Self {
            quarantine,
            interval,
            quarantine_ts_col: cohort_model::columns::TIMESTAMP.to_string(),
            name: "quarantine".to_string(),
            keys: KeyColumns::default(),
        }
    }

    /// Timestamp column of the quarantine table, when it differs from the key column.
    #[must_use]
    pub fn with_quarantine_timestamp_col(mut self, column: impl Into<String>) -> Self {
        self.quarantine_ts_col = column.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }
}

impl PredictionTimeFilter for QuarantineFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut table: LazyFrame) -> Result<LazyFrame> {
        let entity = self.keys.entity_id.as_str();
        let ts = self.keys.timestamp.as_str();
        require_columns(&self.name, &mut table, &[entity, ts])?;
        let mut quarantine = self.quarantine.clone();
        require_columns(&self.name, &mut quarantine, &[entity, self.quarantine_ts_col.as_str()])?;

        let events = quarantine.select([
            col(entity),
            col(self.quarantine_ts_col.as_str()).alias(QUARANTINE_TMP),
        ]);
        let since_event = epoch_millis(col(ts)) - epoch_millis(col(QUARANTINE_TMP));
        let hits = table
            .clone()
            .select([col(entity), col(ts)])
            .join(
                events,
                [col(entity)],
                [col(entity)],
                JoinArgs::new(JoinType::Inner),
            )
            .filter(
                since_event
                    .clone()
                    .gt(lit(0i64))
                    .and(since_event.lt(lit(self.interval.num_milliseconds()))),
            )
            .select([col(entity), col(ts)]);

        Ok(table.join(
            hits,
            [col(entity), col(ts)],
            [col(entity), col(ts)],
            JoinArgs::new(JoinType::Anti),
        ))
    }
}
