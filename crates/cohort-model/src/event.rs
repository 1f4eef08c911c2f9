//! Temporal events and static features.
//!
//! A [`TemporalEvent`] is one timestamped fact about one entity: a lab
//! result, a diagnosis, an administered medication, a visit. A
//! [`StaticFeature`] is entity-scoped but carries no time (sex, date of birth).
//! Both are plain immutable values; the timeline that owns them never edits
//! them after construction.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The value carried by an event or a static feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Numeric(f64),
    Text(String),
}

impl EventValue {
    /// Numeric view of the value.
    ///
    /// Text is parsed when it holds a number; otherwise `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        Self::Numeric(value as f64)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One timestamped observation about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEvent {
    pub entity_id: i64,
    pub timestamp: NaiveDateTime,
    /// Source table the event came from (e.g. "lab", "diagnosis").
    pub source: String,
    /// Event name within the source, if the source distinguishes several.
    pub name: Option<String>,
    pub value: EventValue,
}

impl TemporalEvent {
    pub fn new(
        entity_id: i64,
        timestamp: NaiveDateTime,
        source: impl Into<String>,
        value: impl Into<EventValue>,
    ) -> Self {
        Self {
            entity_id,
            timestamp,
            source: source.into(),
            name: None,
            value: value.into(),
        }
    }

    /// Set the event name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when the event matches the optional source and name selectors.
    ///
    /// A `None` selector matches everything.
    pub fn matches(&self, source: Option<&str>, name: Option<&str>) -> bool {
        let source_ok = source.is_none_or(|s| s == self.source);
        let name_ok = name.is_none_or(|n| self.name.as_deref() == Some(n));
        source_ok && name_ok
    }
}

/// A time-invariant attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticFeature {
    pub name: String,
    pub value: EventValue,
}

impl StaticFeature {
    pub fn new(name: impl Into<String>, value: impl Into<EventValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
