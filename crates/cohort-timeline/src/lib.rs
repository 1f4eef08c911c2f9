//! Entity timelines and prediction-time windowing.
//!
//! A [`Patient`] owns one entity's events (sorted once) and static features.
//! [`Patient::to_prediction_times`] slices it into [`PredictionTime`]s whose
//! events lie in the half-open lookbehind window `[t - lookbehind, t)`.
//! Each window is located with two binary searches over the sorted events.

pub mod error;
pub mod frames;
pub mod patient;
pub mod prediction_time;

pub use error::{Result, TimelineError};
pub use frames::{TimelineColumns, event_value, patients_from_frames, value_to_string};
pub use patient::Patient;
pub use prediction_time::{PredictionTime, prediction_time_uuid};
