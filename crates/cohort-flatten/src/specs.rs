//! Feature and label definitions.

use chrono::TimeDelta;
use cohort_common::format_numeric;
use serde::{Deserialize, Serialize};

use crate::aggregation::Aggregation;
use crate::error::{FlattenError, Result};

fn fallback_label(fallback: Option<f64>) -> String {
    fallback.map_or_else(|| "nan".to_string(), format_numeric)
}

fn window(feature: &str, days: i64) -> Result<TimeDelta> {
    if days < 0 {
        return Err(FlattenError::NegativeWindow {
            feature: feature.to_string(),
            days,
        });
    }
    TimeDelta::try_days(days).ok_or_else(|| FlattenError::WindowOutOfRange {
        feature: feature.to_string(),
        days,
    })
}

/// A predictor aggregated over `[t - lookbehind, t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictorSpec {
    pub feature: String,
    /// Only events from this source table.
    #[serde(default)]
    pub source: Option<String>,
    /// Only events with this name.
    #[serde(default)]
    pub event_name: Option<String>,
    pub lookbehind_days: i64,
    pub aggregation: Aggregation,
    /// Value for empty windows; `None` leaves the cell null.
    #[serde(default)]
    pub fallback: Option<f64>,
}

impl PredictorSpec {
    pub fn new(feature: impl Into<String>, lookbehind_days: i64, aggregation: Aggregation) -> Self {
        Self {
            feature: feature.into(),
            source: None,
            event_name: None,
            lookbehind_days,
            aggregation,
            fallback: None,
        }
    }

    #[must_use]
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn named(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn lookbehind(&self) -> Result<TimeDelta> {
        window(&self.feature, self.lookbehind_days)
    }

    pub fn column_name(&self) -> String {
        format!(
            "pred_{}_within_{}_days_{}_fallback_{}",
            self.feature,
            self.lookbehind_days,
            self.aggregation,
            fallback_label(self.fallback)
        )
    }
}

/// An outcome aggregated over `(t, t + lookahead]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeSpec {
    pub feature: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    pub lookahead_days: i64,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub fallback: Option<f64>,
}

impl OutcomeSpec {
    pub fn new(feature: impl Into<String>, lookahead_days: i64, aggregation: Aggregation) -> Self {
        Self {
            feature: feature.into(),
            source: None,
            event_name: None,
            lookahead_days,
            aggregation,
            fallback: None,
        }
    }

    #[must_use]
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn lookahead(&self) -> Result<TimeDelta> {
        window(&self.feature, self.lookahead_days)
    }

    pub fn column_name(&self) -> String {
        format!(
            "outc_{}_within_{}_days_{}_fallback_{}",
            self.feature,
            self.lookahead_days,
            self.aggregation,
            fallback_label(self.fallback)
        )
    }
}

/// A binary label from the entity's outcome timestamp: 1 if it falls in `(t, t + lookahead]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimestampOutcomeSpec {
    pub feature: String,
    pub lookahead_days: i64,
}

impl TimestampOutcomeSpec {
    pub fn new(feature: impl Into<String>, lookahead_days: i64) -> Self {
        Self {
            feature: feature.into(),
            lookahead_days,
        }
    }

    pub fn lookahead(&self) -> Result<TimeDelta> {
        window(&self.feature, self.lookahead_days)
    }

    pub fn column_name(&self) -> String {
        format!(
            "outc_{}_within_{}_days_max_fallback_0",
            self.feature, self.lookahead_days
        )
    }
}
