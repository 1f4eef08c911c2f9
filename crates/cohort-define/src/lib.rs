//! Cohort definitions.
//!
//! A [`CohortDefinition`] yields eligible prediction times (with their filter
//! trail) and one outcome timestamp per entity. [`ProjectCohort`] builds one
//! from a candidate [`TableLoader`], a [`FilterChain`](cohort_filter::FilterChain)
//! and outcome loaders. Tables are read through an explicit [`TableCache`].

pub mod cache;
pub mod definition;
pub mod error;
pub mod loader;
pub mod outcome;

pub use cache::{CacheKey, DiskCache, MemoryCache, NoCache, TableCache, load_cached};
pub use definition::{CohortDefinition, EvaluatedCohort, ProjectCohort, evaluate_cohorts};
pub use error::{CohortError, Result};
pub use loader::{CsvLoader, FrameLoader, TableLoader};
pub use outcome::{OutcomeSource, earliest_outcome_per_entity};
