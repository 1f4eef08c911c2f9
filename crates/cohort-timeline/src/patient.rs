//! Per-entity timelines.

use chrono::{NaiveDateTime, TimeDelta};
use cohort_model::{StaticFeature, TemporalEvent};

use crate::error::{Result, TimelineError};
use crate::prediction_time::PredictionTime;

/// All events and static features of one entity.
///
/// Events are sorted by timestamp once, at construction (stable, so events
/// sharing a timestamp keep their input order). The timeline is read-only
/// afterwards; windows are borrowed slices of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    entity_id: i64,
    temporal_events: Vec<TemporalEvent>,
    static_features: Vec<StaticFeature>,
}

impl Patient {
    /// Build a timeline.
    ///
    /// # Errors
    ///
    /// [`TimelineError::EntityMismatch`] if any event carries another entity id.
    pub fn new(
        entity_id: i64,
        mut temporal_events: Vec<TemporalEvent>,
        static_features: Vec<StaticFeature>,
    ) -> Result<Self> {
        if let Some(foreign) = temporal_events.iter().find(|e| e.entity_id != entity_id) {
            return Err(TimelineError::EntityMismatch {
                expected: entity_id,
                found: foreign.entity_id,
            });
        }
        temporal_events.sort_by_key(|e| e.timestamp);
        Ok(Self {
            entity_id,
            temporal_events,
            static_features,
        })
    }

    pub fn entity_id(&self) -> i64 {
        self.entity_id
    }

    /// Events in timestamp order.
    pub fn temporal_events(&self) -> &[TemporalEvent] {
        &self.temporal_events
    }

    pub fn static_features(&self) -> &[StaticFeature] {
        &self.static_features
    }

    pub fn static_feature(&self, name: &str) -> Option<&StaticFeature> {
        self.static_features.iter().find(|f| f.name == name)
    }

    /// Events with `start <= timestamp < end`.
    pub fn events_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[TemporalEvent] {
        let lo = self.temporal_events.partition_point(|e| e.timestamp < start);
        let hi = self.temporal_events.partition_point(|e| e.timestamp < end);
        if hi <= lo {
            return &[];
        }
        &self.temporal_events[lo..hi]
    }

    /// Events with `t < timestamp <= t + lookahead`.
    pub fn lookahead_events(&self, t: NaiveDateTime, lookahead: TimeDelta) -> &[TemporalEvent] {
        let end = t.checked_add_signed(lookahead).unwrap_or(NaiveDateTime::MAX);
        let lo = self.temporal_events.partition_point(|e| e.timestamp <= t);
        let hi = self.temporal_events.partition_point(|e| e.timestamp <= end);
        if hi <= lo {
            return &[];
        }
        &self.temporal_events[lo..hi]
    }

    /// Timestamp of the earliest event matching the selectors.
    pub fn first_event_time(
        &self,
        source: Option<&str>,
        name: Option<&str>,
    ) -> Option<NaiveDateTime> {
        self.temporal_events
            .iter()
            .find(|e| e.matches(source, name))
            .map(|e| e.timestamp)
    }

    /// One [`PredictionTime`] per timestamp, in the given order.
    ///
    /// Each carries the events in `[t - lookbehind, t)`: the lookbehind
    /// boundary is included, events exactly at `t` are not.
    pub fn to_prediction_times(
        &self,
        lookbehind: TimeDelta,
        prediction_timestamps: &[NaiveDateTime],
        outcome_timestamp: Option<NaiveDateTime>,
    ) -> Vec<PredictionTime<'_>> {
        prediction_timestamps
            .iter()
            .map(|&t| {
                let start = t.checked_sub_signed(lookbehind).unwrap_or(NaiveDateTime::MIN);
                PredictionTime {
                    entity_id: self.entity_id,
                    prediction_timestamp: t,
                    outcome_timestamp,
                    static_features: &self.static_features,
                    temporal_events: self.events_between(start, t),
                }
            })
            .collect()
    }
}
