//! Prediction-time filtering for cohort construction.
//!
//! - **filter**: the [`PredictionTimeFilter`] interface, closure filters and column checks
//! - **filters**: generic date, age, washout, outcome and column filters
//! - **chain**: the [`FilterChain`] engine with its per-step provenance trail
//! - **registry**: name → factory lookup used by configuration
//! - **config**: TOML chain descriptions

pub mod chain;
pub mod config;
pub mod error;
pub mod filter;
pub mod filters;
pub mod registry;

pub use chain::{FilterChain, LazyChainRun, filter_prediction_times};
pub use config::ChainConfig;
pub use error::{ChainError, ConfigError, FilterError, RegistryError, Result};
pub use filter::{FnFilter, KeyColumns, NamedFilter, PredictionTimeFilter, require_columns};
pub use registry::{
    FilterContext, FilterFactory, FilterRegistry, SideTables, StepParams, default_registry,
};
