//! A single prediction time and its lookbehind window.

use chrono::{NaiveDateTime, TimeDelta};
use cohort_model::{StaticFeature, TemporalEvent};

/// One entity at one prediction timestamp.
///
/// Borrows from the owning [`Patient`](crate::Patient): `temporal_events`
/// is the slice with `prediction_timestamp - lookbehind <= timestamp < prediction_timestamp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionTime<'a> {
    pub entity_id: i64,
    pub prediction_timestamp: NaiveDateTime,
    pub outcome_timestamp: Option<NaiveDateTime>,
    pub static_features: &'a [StaticFeature],
    pub temporal_events: &'a [TemporalEvent],
}

impl PredictionTime<'_> {
    /// Label helper: true iff the outcome falls in `(t, t + lookahead]`.
    pub fn outcome_within(&self, lookahead: TimeDelta) -> bool {
        let Some(outcome) = self.outcome_timestamp else {
            return false;
        };
        let horizon = self
            .prediction_timestamp
            .checked_add_signed(lookahead)
            .unwrap_or(NaiveDateTime::MAX);
        outcome > self.prediction_timestamp && outcome <= horizon
    }

    /// Window events matching the optional source and name selectors.
    pub fn events_matching<'s>(
        &'s self,
        source: Option<&'s str>,
        name: Option<&'s str>,
    ) -> impl Iterator<Item = &'s TemporalEvent> + 's {
        self.temporal_events
            .iter()
            .filter(move |e| e.matches(source, name))
    }

    /// Stable identifier `{entity}-{YYYY-MM-DD-HH-MM-SS}`.
    pub fn uuid(&self) -> String {
        prediction_time_uuid(self.entity_id, self.prediction_timestamp)
    }
}

/// Identifier of an `(entity, timestamp)` prediction time.
pub fn prediction_time_uuid(entity_id: i64, timestamp: NaiveDateTime) -> String {
    format!("{entity_id}-{}", timestamp.format("%Y-%m-%d-%H-%M-%S"))
}
