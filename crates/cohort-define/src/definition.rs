//! Composing loaders, a filter chain and outcome sources into a cohort.

use std::sync::Arc;

use cohort_filter::FilterChain;
use cohort_model::FilteredPredictionTimeBundle;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::{info, info_span};

use crate::cache::{NoCache, TableCache, load_cached};
use crate::error::{CohortError, Result};
use crate::loader::TableLoader;
use crate::outcome::{OutcomeSource, earliest_outcome_per_entity};

/// A population plus the outcome that labels it.
pub trait CohortDefinition: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate prediction times after the cohort's filter chain.
    fn eligible_prediction_times(&self) -> Result<FilteredPredictionTimeBundle>;

    /// `{entity_id, timestamp, value, cause}`, one row per entity with an outcome.
    fn outcome_timestamps(&self) -> Result<DataFrame>;
}

/// A cohort assembled from parts.
///
/// ```no_run
/// use cohort_define::{CsvLoader, MemoryCache, ProjectCohort};
/// use cohort_filter::{filters::MinDateFilter, FilterChain};
/// # use chrono::NaiveDate;
/// # let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
///
/// let cohort = ProjectCohort::new(
///     "t2d",
///     CsvLoader::new("visits", "visits.csv"),
///     FilterChain::new("entity_id").add_filter(MinDateFilter::new(start)),
/// )
/// .add_outcome(CsvLoader::new("hba1c_over_48", "hba1c.csv"))
/// .with_cache(MemoryCache::new());
/// ```
pub struct ProjectCohort {
    name: String,
    candidates: Box<dyn TableLoader>,
    chain: FilterChain,
    outcomes: Vec<Box<dyn TableLoader>>,
    cache: Arc<dyn TableCache>,
}

impl ProjectCohort {
    pub fn new(
        name: impl Into<String>,
        candidates: impl TableLoader + 'static,
        chain: FilterChain,
    ) -> Self {
        Self {
            name: name.into(),
            candidates: Box::new(candidates),
            chain,
            outcomes: Vec::new(),
            cache: Arc::new(NoCache),
        }
    }

    /// Add an outcome table; its loader id becomes the `cause`.
    #[must_use]
    pub fn add_outcome(mut self, loader: impl TableLoader + 'static) -> Self {
        self.outcomes.push(Box::new(loader));
        self
    }

    #[must_use]
    pub fn with_cache(self, cache: impl TableCache + 'static) -> Self {
        self.with_shared_cache(Arc::new(cache))
    }

    /// Share one cache between cohorts.
    #[must_use]
    pub fn with_shared_cache(mut self, cache: Arc<dyn TableCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

impl CohortDefinition for ProjectCohort {
    fn name(&self) -> &str {
        &self.name
    }

    fn eligible_prediction_times(&self) -> Result<FilteredPredictionTimeBundle> {
        let candidates = load_cached(self.cache.as_ref(), self.candidates.as_ref())?;
        Ok(self.chain.run(candidates)?)
    }

    fn outcome_timestamps(&self) -> Result<DataFrame> {
        if self.outcomes.is_empty() {
            return Err(CohortError::NoOutcomeSources {
                cohort: self.name.clone(),
            });
        }
        let sources = self
            .outcomes
            .iter()
            .map(|loader| {
                let table = load_cached(self.cache.as_ref(), loader.as_ref())?;
                Ok(OutcomeSource::new(loader.id(), table))
            })
            .collect::<Result<Vec<_>>>()?;
        earliest_outcome_per_entity(&sources)
    }
}

/// Prediction times and outcomes of one cohort.
#[derive(Debug, Clone)]
pub struct EvaluatedCohort {
    pub name: String,
    pub prediction_times: FilteredPredictionTimeBundle,
    pub outcome_timestamps: DataFrame,
}

fn evaluate(cohort: &dyn CohortDefinition) -> Result<EvaluatedCohort> {
    let span = info_span!("cohort", name = cohort.name());
    let _guard = span.enter();

    let prediction_times = cohort.eligible_prediction_times()?;
    let outcome_timestamps = cohort.outcome_timestamps()?;
    info!(
        prediction_times = prediction_times.n_rows(),
        entities_with_outcome = outcome_timestamps.height(),
        "evaluated cohort"
    );
    Ok(EvaluatedCohort {
        name: cohort.name().to_string(),
        prediction_times,
        outcome_timestamps,
    })
}

/// Evaluate independent cohorts in parallel. Results keep the input order;
/// the first failing cohort's error is returned.
pub fn evaluate_cohorts(cohorts: &[&dyn CohortDefinition]) -> Result<Vec<EvaluatedCohort>> {
    cohorts.par_iter().map(|cohort| evaluate(*cohort)).collect()
}
