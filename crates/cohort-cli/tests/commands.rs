//! Filter and flatten commands over CSV inputs.

use std::fs;
use std::path::{Path, PathBuf};

use cohort_cli::cli::{FilterArgs, FlattenArgs};
use cohort_cli::commands::{run_filter, run_flatten};
use cohort_define::{CsvLoader, TableLoader};

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

const CANDIDATES: &str = "\
entity_id,timestamp
1,2012-05-01 00:00:00
1,2018-05-01 00:00:00
2,2016-01-01 00:00:00
3,2017-03-01 00:00:00
";

const BIRTHDAYS: &str = "\
entity_id,date_of_birth
1,1980-01-01
2,2010-06-01
3,1990-02-02
";

const CHAIN: &str = r#"
[[steps]]
filter = "min_date"
date = "2013-01-01"

[[steps]]
filter = "join_age"
side_table = "birthdays"

[[steps]]
filter = "age"
min_age = 18

[[steps]]
filter = "drop_columns"
columns = ["age"]
"#;

fn filter_args(dir: &Path, lazy: bool) -> FilterArgs {
    FilterArgs {
        candidates: write(dir, "candidates.csv", CANDIDATES),
        chain: write(dir, "chain.toml", CHAIN),
        side_tables: vec![("birthdays".to_string(), write(dir, "birthdays.csv", BIRTHDAYS))],
        output_dir: Some(dir.join("filtered")),
        lazy,
    }
}

#[test]
fn filter_command_runs_configured_chain() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_filter(&filter_args(dir.path(), false)).unwrap();

    let names: Vec<&str> = outcome
        .bundle
        .filter_steps
        .iter()
        .map(|s| s.step_name.as_str())
        .collect();
    assert_eq!(names, ["min_date", "join_age", "min_age", "drop_columns"]);
    assert_eq!(outcome.bundle.n_rows(), 2);
    assert_eq!(outcome.bundle.prediction_times.width(), 2);
    assert!(dir.path().join("filtered/prediction_times.arrow").exists());
    assert!(dir.path().join("filtered/filter_steps.json").exists());
}

#[test]
fn lazy_filter_matches_eager() {
    let eager_dir = tempfile::tempdir().unwrap();
    let lazy_dir = tempfile::tempdir().unwrap();
    let eager = run_filter(&filter_args(eager_dir.path(), false)).unwrap();
    let lazy = run_filter(&filter_args(lazy_dir.path(), true)).unwrap();
    assert_eq!(eager.bundle.filter_steps, lazy.bundle.filter_steps);
}

#[test]
fn unknown_filter_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = filter_args(dir.path(), false);
    args.chain = write(dir.path(), "bad.toml", "[[steps]]\nfilter = \"nope\"\n");
    let err = run_filter(&args).err().unwrap();
    assert!(format!("{err:#}").contains("unknown filter 'nope'"));
}

#[test]
fn flatten_command_reads_a_saved_bundle() {
    let dir = tempfile::tempdir().unwrap();
    run_filter(&filter_args(dir.path(), false)).unwrap();

    let events = write(
        dir.path(),
        "events.csv",
        "entity_id,timestamp,source,value\n\
         1,2018-04-01 00:00:00,lab,5.0\n\
         1,2018-04-20 00:00:00,lab,7.0\n\
         3,2016-01-01 00:00:00,lab,3.0\n",
    );
    let config = write(
        dir.path(),
        "flatten.toml",
        "[[predictors]]\n\
         feature = \"lab\"\n\
         source = \"lab\"\n\
         lookbehind_days = 90\n\
         aggregation = \"mean\"\n\
         fallback = 0\n",
    );
    let output = dir.path().join("flat.csv");
    let outcome = run_flatten(&FlattenArgs {
        prediction_times: dir.path().join("filtered"),
        config,
        events,
        statics: None,
        outcomes: None,
        output: output.clone(),
    })
    .unwrap();

    assert_eq!(outcome.rows, 2);
    let column = "pred_lab_within_90_days_mean_fallback_0";
    assert!(outcome.columns.iter().any(|(name, nulls)| name == column && *nulls == 0));

    let written = CsvLoader::new("flat", &output).load().unwrap();
    let values: Vec<Option<f64>> = written
        .column(column)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(values, [Some(6.0), Some(0.0)]);
}
