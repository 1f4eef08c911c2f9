//! Windowed feature and label extraction.
//!
//! A [`Flattener`] holds predictor, outcome and label specs. For every row of
//! a prediction-time table it looks up the entity's
//! [`Patient`](cohort_timeline::Patient) timeline, aggregates the events in
//! each spec's window and writes one wide row. Entities are processed in
//! parallel with rayon unless the flattener is made sequential.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod flattener;
pub mod specs;

pub use aggregation::Aggregation;
pub use config::FlattenConfig;
pub use error::{FlattenError, Result};
pub use flattener::{Flattener, outcome_timestamps_from_frame};
pub use specs::{OutcomeSpec, PredictorSpec, TimestampOutcomeSpec};
