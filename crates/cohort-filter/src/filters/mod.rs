//! Generic prediction-time filters.
//!
//! Every filter here is an instance of [`PredictionTimeFilter`](crate::PredictionTimeFilter);
//! disease-specific cohorts are built by parameterising and ordering them.

mod age;
mod column;
mod date;
mod drop;
mod outcome;
mod quarantine;

pub use age::{AgeFilter, JoinAgeStep};
pub use column::{
    ColumnPredicateFilter, ColumnPrefixFilter, ColumnValue, ColumnValueFilter, Selection,
};
pub use date::{ExcludeYearFilter, MaxDateFilter, MinDateFilter};
pub use drop::DropColumnsStep;
pub use outcome::{NoIncidentOutcomeFilter, WithoutPrevalentOutcomeFilter};
pub use quarantine::QuarantineFilter;

use chrono::NaiveDateTime;

fn epoch_ms(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_millis()
}
