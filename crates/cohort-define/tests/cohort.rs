//! Composing and evaluating cohorts.

use std::fs;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use cohort_define::{
    CohortDefinition, CohortError, CsvLoader, DiskCache, FrameLoader, MemoryCache, ProjectCohort,
    TableCache, evaluate_cohorts,
};
use cohort_filter::filters::{AgeFilter, MinDateFilter};
use cohort_filter::{ChainError, FilterChain};
use polars::prelude::*;

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn keyed(rows: &[(i64, NaiveDateTime)]) -> DataFrame {
    let entities: Vec<i64> = rows.iter().map(|(e, _)| *e).collect();
    let stamps: Vec<NaiveDateTime> = rows.iter().map(|(_, t)| *t).collect();
    DataFrame::new(vec![
        Series::new("entity_id".into(), entities).into_column(),
        Series::new("timestamp".into(), stamps).into_column(),
    ])
    .unwrap()
}

fn visits() -> FrameLoader {
    FrameLoader::new(
        "visits",
        keyed(&[(1, ts(2012, 6, 1)), (1, ts(2014, 1, 1)), (2, ts(2015, 3, 1))]),
    )
}

fn cohort(name: &str) -> ProjectCohort {
    ProjectCohort::new(
        name,
        visits(),
        FilterChain::new("entity_id").add_filter(MinDateFilter::new(ts(2013, 1, 1))),
    )
    .add_outcome(FrameLoader::new("diagnosis", keyed(&[(2, ts(2016, 1, 1))])))
}

#[test]
fn project_cohort_filters_candidates_and_derives_outcomes() {
    let cohort = cohort("t2d");
    let bundle = cohort.eligible_prediction_times().unwrap();
    assert_eq!(bundle.n_rows(), 2);
    assert_eq!(bundle.filter_steps.len(), 1);
    assert_eq!(bundle.filter_steps[0].step_name, "min_date");
    assert_eq!(bundle.filter_steps[0].n_dropped(), 1);

    let outcomes = cohort.outcome_timestamps().unwrap();
    assert_eq!(outcomes.height(), 1);
    assert_eq!(outcomes.width(), 4);
}

#[test]
fn cohorts_evaluate_in_parallel_in_input_order() {
    let cache: Arc<dyn TableCache> = Arc::new(MemoryCache::new());
    let a = cohort("a").with_shared_cache(Arc::clone(&cache));
    let b = cohort("b").with_shared_cache(Arc::clone(&cache));
    let c = cohort("c").with_shared_cache(cache);

    let cohorts: [&dyn CohortDefinition; 3] = [&a, &b, &c];
    let results = evaluate_cohorts(&cohorts).unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert!(results.iter().all(|r| r.prediction_times.n_rows() == 2));
}

#[test]
fn chain_failures_surface_with_context() {
    let cohort = ProjectCohort::new(
        "broken",
        visits(),
        FilterChain::new("entity_id").add_filter(AgeFilter::min(18.0)),
    );
    let err = cohort.eligible_prediction_times().unwrap_err();
    match err {
        CohortError::Chain(ChainError::StepFailed {
            step_index,
            n_rows_before,
            ..
        }) => {
            assert_eq!(step_index, 0);
            assert_eq!(n_rows_before, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        cohort.outcome_timestamps(),
        Err(CohortError::NoOutcomeSources { .. })
    ));
}

#[test]
fn csv_cohort_reads_through_disk_cache() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = dir.path().join("candidates.csv");
    fs::write(
        &candidates,
        "entity_id,timestamp\n1,2012-01-01 00:00:00\n1,2016-01-01 00:00:00\n3,2018-05-05 00:00:00\n",
    )
    .unwrap();
    let outcomes = dir.path().join("outcomes.csv");
    fs::write(
        &outcomes,
        "entity_id,timestamp\n3,2019-01-01 00:00:00\n3,2018-12-01 00:00:00\n",
    )
    .unwrap();

    let cache_dir = dir.path().join("cache");
    let build = || {
        ProjectCohort::new(
            "csv",
            CsvLoader::new("candidates", &candidates),
            FilterChain::new("entity_id").add_filter(MinDateFilter::new(ts(2013, 1, 1))),
        )
        .add_outcome(CsvLoader::new("outcomes", &outcomes))
        .with_cache(DiskCache::new(&cache_dir))
    };

    let first = build().eligible_prediction_times().unwrap();
    assert_eq!(first.n_rows(), 2);
    assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 1);

    // second run is served from the cache even with the source gone
    fs::remove_file(&candidates).unwrap();
    let second = build().eligible_prediction_times().unwrap();
    assert!(second.prediction_times.equals(&first.prediction_times));

    let earliest = build().outcome_timestamps().unwrap();
    assert_eq!(earliest.height(), 1);
}
