//! Value types shared across the cohort workspace.
//!
//! - **event**: timestamped observations and time-invariant attributes of one entity
//! - **delta**: per-step population bookkeeping of a filter chain
//! - **bundle**: the filtered prediction-time table together with its step trail
//! - **columns**: canonical column names used by loaders, filters and flattening

pub mod bundle;
pub mod columns;
pub mod delta;
pub mod error;
pub mod event;

pub use bundle::FilteredPredictionTimeBundle;
pub use delta::StepDelta;
pub use error::{ModelError, Result};
pub use event::{EventValue, StaticFeature, TemporalEvent};
