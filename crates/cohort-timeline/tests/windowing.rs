//! Lookbehind window boundaries.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use cohort_model::{StaticFeature, TemporalEvent};
use cohort_timeline::Patient;
use proptest::prelude::*;

fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[test]
fn half_open_window_scenario() {
    let patient = Patient::new(
        1,
        vec![
            TemporalEvent::new(1, date(2021, 1, 1), "lab", 1.0),
            TemporalEvent::new(1, date(2021, 1, 3), "lab", 3.0),
        ],
        vec![StaticFeature::new("sex", "M")],
    )
    .unwrap();

    let times = patient.to_prediction_times(
        TimeDelta::days(2),
        &[date(2021, 1, 2), date(2021, 1, 4)],
        Some(date(2021, 2, 1)),
    );

    assert_eq!(times.len(), 2);
    assert_eq!(times[0].prediction_timestamp, date(2021, 1, 2));
    assert_eq!(times[0].temporal_events.len(), 1);
    assert_eq!(times[0].temporal_events[0].timestamp, date(2021, 1, 1));

    assert_eq!(times[1].prediction_timestamp, date(2021, 1, 4));
    assert_eq!(times[1].temporal_events.len(), 1);
    assert_eq!(times[1].temporal_events[0].timestamp, date(2021, 1, 3));

    for t in &times {
        assert_eq!(t.static_features, patient.static_features());
        assert_eq!(t.outcome_timestamp, Some(date(2021, 2, 1)));
    }
}

#[test]
fn boundaries_include_lookbehind_start_and_exclude_t() {
    let t = date(2021, 6, 10);
    let patient = Patient::new(
        4,
        vec![
            TemporalEvent::new(4, t - TimeDelta::days(2), "lab", 1.0),
            TemporalEvent::new(4, t - TimeDelta::days(1), "lab", 2.0),
            TemporalEvent::new(4, t, "lab", 3.0),
        ],
        vec![],
    )
    .unwrap();

    let times = patient.to_prediction_times(TimeDelta::days(2), &[t], None);
    let values: Vec<f64> = times[0]
        .temporal_events
        .iter()
        .filter_map(|e| e.value.as_f64())
        .collect();
    assert_eq!(values, vec![1.0, 2.0]);
}

#[test]
fn output_follows_input_order() {
    let patient = Patient::new(2, vec![], vec![]).unwrap();
    let stamps = [date(2022, 1, 3), date(2020, 1, 1), date(2021, 5, 5)];
    let times = patient.to_prediction_times(TimeDelta::days(30), &stamps, None);
    let got: Vec<NaiveDateTime> = times.iter().map(|p| p.prediction_timestamp).collect();
    assert_eq!(got, stamps.to_vec());
    assert!(times.iter().all(|p| p.temporal_events.is_empty()));
}

proptest! {
    #[test]
    fn window_matches_linear_scan(
        event_hours in prop::collection::vec(0i64..2_000, 0..60),
        prediction_hours in prop::collection::vec(0i64..2_000, 1..10),
        lookbehind_hours in 0i64..500,
    ) {
        let base = date(2020, 1, 1);
        let events: Vec<TemporalEvent> = event_hours
            .iter()
            .enumerate()
            .map(|(i, h)| TemporalEvent::new(9, base + TimeDelta::hours(*h), "lab", i as f64))
            .collect();
        let patient = Patient::new(9, events.clone(), vec![]).unwrap();
        let lookbehind = TimeDelta::hours(lookbehind_hours);
        let stamps: Vec<NaiveDateTime> = prediction_hours
            .iter()
            .map(|h| base + TimeDelta::hours(*h))
            .collect();

        let times = patient.to_prediction_times(lookbehind, &stamps, None);
        prop_assert_eq!(times.len(), stamps.len());

        for (pt, t) in times.iter().zip(&stamps) {
            prop_assert_eq!(pt.prediction_timestamp, *t);
            for e in pt.temporal_events {
                prop_assert!(*t - lookbehind <= e.timestamp && e.timestamp < *t);
            }
            let expected = events
                .iter()
                .filter(|e| *t - lookbehind <= e.timestamp && e.timestamp < *t)
                .count();
            prop_assert_eq!(pt.temporal_events.len(), expected);
        }
    }
}
