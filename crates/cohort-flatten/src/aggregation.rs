//! Reductions of the events inside one window.

use std::fmt;
use std::str::FromStr;

use cohort_model::TemporalEvent;
use serde::{Deserialize, Serialize};

/// How the events of a window become one value.
///
/// Events arrive in timestamp order. `count` and `has_values` look at every
/// event; the others only at events with a numeric value. An empty window
/// yields `None` (the configured fallback is used instead), except for `count`
/// and `has_values`, which yield 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Latest,
    Earliest,
    Mean,
    Min,
    Max,
    Sum,
    Count,
    HasValues,
    /// Latest minus earliest.
    Change,
    /// Sample variance (n - 1 denominator); needs two values.
    Variance,
}

impl Aggregation {
    pub const ALL: [Aggregation; 10] = [
        Self::Latest,
        Self::Earliest,
        Self::Mean,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Count,
        Self::HasValues,
        Self::Change,
        Self::Variance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Earliest => "earliest",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::HasValues => "has_values",
            Self::Change => "change",
            Self::Variance => "variance",
        }
    }

    /// Reduce the window.
    pub fn apply<'a, I>(self, events: I) -> Option<f64>
    where
        I: IntoIterator<Item = &'a TemporalEvent>,
    {
        let mut n_events = 0usize;
        let mut values = Vec::new();
        for event in events {
            n_events += 1;
            if let Some(v) = event.value.as_f64() {
                values.push(v);
            }
        }

        match self {
            Self::Count => return Some(n_events as f64),
            Self::HasValues => return Some(if n_events > 0 { 1.0 } else { 0.0 }),
            _ => {}
        }
        let first = *values.first()?;
        let last = *values.last()?;
        let n = values.len() as f64;
        match self {
            Self::Latest => Some(last),
            Self::Earliest => Some(first),
            Self::Mean => Some(values.iter().sum::<f64>() / n),
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
            Self::Sum => Some(values.iter().sum()),
            Self::Change => Some(last - first),
            Self::Variance => {
                if values.len() < 2 {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / n;
                let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                Some(squares / (n - 1.0))
            }
            Self::Count | Self::HasValues => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown aggregation '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn events(values: &[Option<f64>]) -> Vec<TemporalEvent> {
        let base = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let ts = base + TimeDelta::days(i as i64);
                match v {
                    Some(v) => TemporalEvent::new(1, ts, "lab", *v),
                    None => TemporalEvent::new(1, ts, "lab", "pending"),
                }
            })
            .collect()
    }

    #[test]
    fn reductions_follow_timestamp_order() {
        let window = events(&[Some(4.0), None, Some(1.0), Some(7.0)]);
        assert_eq!(Aggregation::Latest.apply(&window), Some(7.0));
        assert_eq!(Aggregation::Earliest.apply(&window), Some(4.0));
        assert_eq!(Aggregation::Mean.apply(&window), Some(4.0));
        assert_eq!(Aggregation::Min.apply(&window), Some(1.0));
        assert_eq!(Aggregation::Max.apply(&window), Some(7.0));
        assert_eq!(Aggregation::Sum.apply(&window), Some(12.0));
        assert_eq!(Aggregation::Count.apply(&window), Some(4.0));
        assert_eq!(Aggregation::HasValues.apply(&window), Some(1.0));
        assert_eq!(Aggregation::Change.apply(&window), Some(3.0));
        assert_eq!(Aggregation::Variance.apply(&window), Some(9.0));
    }

    #[test]
    fn empty_window_falls_back() {
        let window: Vec<TemporalEvent> = Vec::new();
        assert_eq!(Aggregation::Mean.apply(&window), None);
        assert_eq!(Aggregation::Latest.apply(&window), None);
        assert_eq!(Aggregation::Count.apply(&window), Some(0.0));
        assert_eq!(Aggregation::HasValues.apply(&window), Some(0.0));
        assert_eq!(Aggregation::Variance.apply(&events(&[Some(2.0)])), None);
    }

    #[test]
    fn parses_names() {
        assert_eq!("has_values".parse::<Aggregation>(), Ok(Aggregation::HasValues));
        assert!("median".parse::<Aggregation>().is_err());
        for agg in Aggregation::ALL {
            assert_eq!(agg.as_str().parse::<Aggregation>(), Ok(agg));
        }
    }
}
