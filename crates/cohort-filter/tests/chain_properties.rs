//! Behaviour of complete filter chains.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use cohort_filter::filters::{
    AgeFilter, ColumnPrefixFilter, ExcludeYearFilter, JoinAgeStep, MaxDateFilter, MinDateFilter,
    QuarantineFilter, Selection,
};
use cohort_filter::{ChainError, FilterChain, FilterError, PredictionTimeFilter};
use polars::prelude::{Column, DataFrame, IntoColumn, IntoLazy, LazyFrame, NamedFrom, Series};
use proptest::prelude::*;

fn ts(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn keyed(entities: &[i64], timestamps: &[NaiveDateTime]) -> DataFrame {
    let columns: Vec<Column> = vec![
        Series::new("entity_id".into(), entities.to_vec()).into_column(),
        Series::new("timestamp".into(), timestamps.to_vec()).into_column(),
    ];
    DataFrame::new(columns).unwrap()
}

fn pairs(df: &DataFrame) -> Vec<(i64, NaiveDateTime)> {
    let entities = cohort_common::integer_column(df, "entity_id").unwrap();
    let timestamps = cohort_common::timestamp_column(df, "timestamp").unwrap();
    let mut out: Vec<(i64, NaiveDateTime)> = entities
        .into_iter()
        .zip(timestamps)
        .map(|(e, t)| (e.unwrap(), t.unwrap()))
        .collect();
    out.sort();
    out
}

fn birthdays() -> LazyFrame {
    let columns: Vec<Column> = vec![
        Series::new("entity_id".into(), vec![1i64, 2, 3]).into_column(),
        Series::new(
            "date_of_birth".into(),
            vec![ts(1990, 1, 1), ts(2005, 6, 1), ts(1940, 1, 1)],
        )
        .into_column(),
    ];
    DataFrame::new(columns).unwrap().lazy()
}

fn candidates() -> DataFrame {
    keyed(
        &[1, 1, 2, 2, 3],
        &[
            ts(2012, 5, 1),
            ts(2018, 5, 1),
            ts(2014, 1, 1),
            ts(2024, 1, 1),
            ts(2016, 7, 1),
        ],
    )
}

#[test]
fn two_year_exclusions_end_to_end() {
    let initial = keyed(&[1, 1, 2], &[ts(2020, 1, 1), ts(2019, 1, 1), ts(2022, 1, 1)]);

    let bundle = FilterChain::new("entity_id")
        .add_filter(ExcludeYearFilter::new(2019))
        .add_filter(ExcludeYearFilter::new(2018))
        .run(initial)
        .unwrap();

    assert_eq!(
        pairs(&bundle.prediction_times),
        vec![(1, ts(2020, 1, 1)), (2, ts(2022, 1, 1))]
    );
    assert_eq!(bundle.filter_steps.len(), 2);

    let first = &bundle.filter_steps[0];
    assert_eq!(first.step_index, 0);
    assert_eq!((first.n_rows_before, first.n_rows_after), (3, 2));
    assert_eq!((first.n_entities_before, first.n_entities_after), (2, 2));

    let second = &bundle.filter_steps[1];
    assert_eq!(second.step_index, 1);
    assert_eq!((second.n_rows_before, second.n_rows_after), (2, 2));

    insta::assert_snapshot!(bundle.flow_chart(), @r"
    step 0 exclude_year_2019: rows 3 -> 2 (-1), entities 2 -> 2 (-0)
    step 1 exclude_year_2018: rows 2 -> 2 (-0), entities 2 -> 2 (-0)
    ");
}

#[test]
fn legal_orderings_agree() {
    let join_first = FilterChain::new("entity_id")
        .add_filter(JoinAgeStep::new(birthdays()))
        .add_filter(MinDateFilter::new(ts(2013, 1, 1)))
        .add_filter(AgeFilter::min(18.0))
        .run(candidates())
        .unwrap();
    let date_first = FilterChain::new("entity_id")
        .add_filter(MinDateFilter::new(ts(2013, 1, 1)))
        .add_filter(JoinAgeStep::new(birthdays()))
        .add_filter(AgeFilter::min(18.0))
        .run(candidates())
        .unwrap();

    let expected = vec![(1, ts(2018, 5, 1)), (2, ts(2024, 1, 1)), (3, ts(2016, 7, 1))];
    assert_eq!(pairs(&join_first.prediction_times), expected);
    assert_eq!(pairs(&date_first.prediction_times), expected);
}

#[test]
fn age_filter_before_join_fails_at_that_step() {
    let err = FilterChain::new("entity_id")
        .add_filter(MinDateFilter::new(ts(2013, 1, 1)))
        .add_filter(AgeFilter::min(18.0))
        .add_filter(JoinAgeStep::new(birthdays()))
        .run(candidates())
        .unwrap_err();

    match err {
        ChainError::StepFailed {
            step_index,
            step_name,
            n_rows_before,
            n_entities_before,
            completed,
            source,
        } => {
            assert_eq!(step_index, 1);
            assert_eq!(step_name, "min_age");
            assert_eq!(n_rows_before, 4);
            assert_eq!(n_entities_before, 3);
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].step_name, "min_date");
            assert!(matches!(
                source,
                FilterError::ColumnMissing { ref column, .. } if column == "age"
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lazy_failure_reports_the_same_context() {
    let err = FilterChain::new("entity_id")
        .add_filter(MinDateFilter::new(ts(2013, 1, 1)))
        .add_filter(AgeFilter::min(18.0))
        .run_lazy(candidates().lazy())
        .err()
        .unwrap();
    assert_eq!(err.step_name(), Some("min_age"));
    assert_eq!(err.completed_steps().len(), 1);
    assert_eq!(err.completed_steps()[0].n_rows_after, 4);
    assert!(err.to_string().contains("4 rows, 3 entities before the step"));
}

#[test]
fn lazy_and_eager_runs_agree() {
    let chain = || {
        FilterChain::new("entity_id")
            .add_filter(MinDateFilter::new(ts(2013, 1, 1)))
            .add_filter(JoinAgeStep::new(birthdays()))
            .add_filter(AgeFilter::new(Some(18.0), Some(80.0)))
    };
    let eager = chain().run(candidates()).unwrap();
    let lazy = chain()
        .run_lazy(candidates().lazy())
        .unwrap()
        .into_bundle()
        .unwrap();

    assert_eq!(eager.filter_steps, lazy.filter_steps);
    assert_eq!(pairs(&eager.prediction_times), pairs(&lazy.prediction_times));
}

#[test]
fn static_filters_are_idempotent() {
    let table = candidates()
        .lazy()
        .with_column(polars::prelude::lit("6600310").alias("shak_code"));
    let joined = JoinAgeStep::new(birthdays()).apply(table).unwrap();

    let filters: Vec<Box<dyn PredictionTimeFilter>> = vec![
        Box::new(MinDateFilter::new(ts(2014, 1, 1))),
        Box::new(MaxDateFilter::new(ts(2020, 1, 1))),
        Box::new(ExcludeYearFilter::new(2016)),
        Box::new(AgeFilter::new(Some(10.0), Some(60.0))),
        Box::new(ColumnPrefixFilter::new("shak_code", ["6600"], Selection::Keep)),
    ];
    for filter in filters {
        let once = filter.apply(joined.clone()).unwrap().collect().unwrap();
        let twice = filter
            .apply(once.clone().lazy())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(pairs(&once), pairs(&twice), "{} is not idempotent", filter.name());
    }
}

fn candidate_table() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((1i64..6, 0i64..3000), 0..40)
}

fn step_choices() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..5, 0..6)
}

fn build_step(choice: u8, quarantine: &DataFrame) -> Box<dyn PredictionTimeFilter> {
    match choice {
        0 => Box::new(MinDateFilter::new(ts(2016, 1, 1))),
        1 => Box::new(MaxDateFilter::new(ts(2021, 6, 30))),
        2 => Box::new(ExcludeYearFilter::new(2018)),
        3 => Box::new(ExcludeYearFilter::new(2022)),
        _ => Box::new(QuarantineFilter::new(
            quarantine.clone().lazy(),
            TimeDelta::days(365),
        )),
    }
}

proptest! {
    #[test]
    fn chains_only_shrink_and_record_every_step(
        rows in candidate_table(),
        choices in step_choices(),
    ) {
        let base = ts(2015, 1, 1);
        let entities: Vec<i64> = rows.iter().map(|(e, _)| *e).collect();
        let timestamps: Vec<NaiveDateTime> = rows
            .iter()
            .map(|(_, d)| base + TimeDelta::days(*d))
            .collect();
        let quarantine = keyed(&[1, 3, 3], &[ts(2017, 3, 1), ts(2016, 1, 1), ts(2019, 9, 9)]);

        let chain = choices
            .iter()
            .fold(FilterChain::new("entity_id").allow_duplicate_keys(), |chain, choice| {
                chain.add_boxed(build_step(*choice, &quarantine))
            });
        let bundle = chain.run(keyed(&entities, &timestamps)).unwrap();

        prop_assert_eq!(bundle.filter_steps.len(), choices.len());
        for (i, step) in bundle.filter_steps.iter().enumerate() {
            prop_assert_eq!(step.step_index, i);
            prop_assert!(step.n_rows_after <= step.n_rows_before);
            prop_assert!(step.n_entities_after <= step.n_entities_before);
            if i > 0 {
                prop_assert_eq!(step.n_rows_before, bundle.filter_steps[i - 1].n_rows_after);
            }
        }
        if let Some(last) = bundle.filter_steps.last() {
            prop_assert_eq!(last.n_rows_after, bundle.n_rows());
        }
    }
}
