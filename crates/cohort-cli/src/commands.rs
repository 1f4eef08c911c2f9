//! Subcommand implementations.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::Table;
use polars::prelude::{CsvWriter, DataFrame, IntoLazy, SerWriter};
use tracing::{info, info_span};

use cohort_define::{CsvLoader, TableLoader};
use cohort_filter::{ChainConfig, LazyChainRun, SideTables, default_registry};
use cohort_flatten::{FlattenConfig, outcome_timestamps_from_frame};
use cohort_model::FilteredPredictionTimeBundle;
use cohort_timeline::{TimelineColumns, patients_from_frames};

use crate::cli::{FilterArgs, FlattenArgs};
use crate::summary::apply_table_style;

pub struct FilterOutcome {
    pub bundle: FilteredPredictionTimeBundle,
    pub saved_to: Option<PathBuf>,
}

pub struct FlattenOutcome {
    pub output: PathBuf,
    pub rows: usize,
    /// Column names with their null counts.
    pub columns: Vec<(String, usize)>,
}

fn read_csv(id: &str, path: &Path) -> Result<DataFrame> {
    CsvLoader::new(id, path)
        .load()
        .with_context(|| format!("read {id} from {}", path.display()))
}

pub fn run_filters() -> Result<()> {
    let registry = default_registry();
    let mut table = Table::new();
    table.set_header(vec!["Filter"]);
    apply_table_style(&mut table);
    for name in registry.names() {
        table.add_row(vec![name]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_filter(args: &FilterArgs) -> Result<FilterOutcome> {
    let span = info_span!("filter", candidates = %args.candidates.display());
    let _guard = span.enter();

    let config = ChainConfig::from_path(&args.chain)
        .with_context(|| format!("load chain config {}", args.chain.display()))?;

    let mut side_tables = SideTables::new();
    for (name, path) in &args.side_tables {
        side_tables.insert(name.clone(), read_csv(name, path)?.lazy());
    }
    let registry = default_registry();
    let chain = config
        .build_chain(&registry, &side_tables)
        .context("build filter chain")?;
    info!(steps = chain.len(), "built filter chain");

    let candidates = read_csv("candidates", &args.candidates)?;
    let bundle = if args.lazy {
        chain
            .run_lazy(candidates.lazy())
            .and_then(LazyChainRun::into_bundle)
    } else {
        chain.run(candidates)
    }
    .context("run filter chain")?;

    if let Some(dir) = &args.output_dir {
        bundle
            .save(dir)
            .with_context(|| format!("save prediction times to {}", dir.display()))?;
    }
    Ok(FilterOutcome {
        bundle,
        saved_to: args.output_dir.clone(),
    })
}

fn read_prediction_times(path: &Path) -> Result<DataFrame> {
    if path.is_dir() {
        let bundle = FilteredPredictionTimeBundle::load(path)
            .with_context(|| format!("load prediction times from {}", path.display()))?;
        Ok(bundle.prediction_times)
    } else {
        read_csv("prediction_times", path)
    }
}

pub fn run_flatten(args: &FlattenArgs) -> Result<FlattenOutcome> {
    let span = info_span!("flatten_command", output = %args.output.display());
    let _guard = span.enter();

    let config = FlattenConfig::from_path(&args.config)
        .with_context(|| format!("load flatten config {}", args.config.display()))?;
    let columns = TimelineColumns {
        entity_id: config.entity_id_col.clone(),
        timestamp: config.timestamp_col.clone(),
        ..TimelineColumns::default()
    };

    let prediction_times = read_prediction_times(&args.prediction_times)?;
    let events = read_csv("events", &args.events)?;
    let statics = args
        .statics
        .as_deref()
        .map(|path| read_csv("statics", path))
        .transpose()?;
    let patients = patients_from_frames(&events, statics.as_ref(), &columns)
        .context("group events into timelines")?;

    let outcome_timestamps = match &args.outcomes {
        Some(path) => {
            let outcomes = read_csv("outcomes", path)?;
            outcome_timestamps_from_frame(&outcomes, &columns.entity_id, &columns.timestamp)
                .context("derive outcome timestamps")?
        }
        None => HashMap::new(),
    };

    let flattener = config.into_flattener();
    let mut flattened = flattener
        .flatten(&prediction_times, &patients, &outcome_timestamps)
        .context("flatten prediction times")?;

    let mut file = File::create(&args.output)
        .with_context(|| format!("create {}", args.output.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut flattened)
        .with_context(|| format!("write {}", args.output.display()))?;

    let columns = flattened
        .get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect();
    Ok(FlattenOutcome {
        output: args.output.clone(),
        rows: flattened.height(),
        columns,
    })
}
