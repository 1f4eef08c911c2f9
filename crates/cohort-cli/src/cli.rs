//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "cohort",
    version,
    about = "Filter prediction times and flatten entity timelines",
    long_about = "Apply a configured filter chain to candidate prediction times and\n\
                  report what every step removed, or turn prediction times and event\n\
                  tables into one feature/label row per prediction time."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a filter chain over candidate prediction times.
    Filter(FilterArgs),

    /// Flatten prediction times into feature and label columns.
    Flatten(FlattenArgs),

    /// List the filters a chain config can name.
    Filters,
}

#[derive(Parser)]
pub struct FilterArgs {
    /// CSV of candidate prediction times (entity_id, timestamp, ...).
    #[arg(value_name = "CANDIDATES")]
    pub candidates: PathBuf,

    /// TOML chain configuration.
    #[arg(long = "chain", value_name = "PATH")]
    pub chain: PathBuf,

    /// Side table referenced by the chain, as NAME=PATH to a CSV file.
    #[arg(long = "side-table", value_name = "NAME=PATH", value_parser = parse_side_table)]
    pub side_tables: Vec<(String, PathBuf)>,

    /// Directory to save the filtered table and its step trail to.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Build the chain as one lazy plan and count steps afterwards.
    #[arg(long = "lazy")]
    pub lazy: bool,
}

#[derive(Parser)]
pub struct FlattenArgs {
    /// Prediction times: a CSV file or a directory saved by `cohort filter`.
    #[arg(value_name = "PREDICTION_TIMES")]
    pub prediction_times: PathBuf,

    /// TOML flatten configuration.
    #[arg(long = "config", value_name = "PATH")]
    pub config: PathBuf,

    /// Long-format event CSV (entity_id, timestamp, value, optional source/name).
    #[arg(long = "events", value_name = "PATH")]
    pub events: PathBuf,

    /// Static feature CSV (entity_id, name, value).
    #[arg(long = "statics", value_name = "PATH")]
    pub statics: Option<PathBuf>,

    /// Outcome CSV used for timestamp labels; the earliest row per entity counts.
    #[arg(long = "outcomes", value_name = "PATH")]
    pub outcomes: Option<PathBuf>,

    /// Output CSV path.
    #[arg(long = "output", value_name = "PATH")]
    pub output: PathBuf,
}

/// Parse `NAME=PATH`.
pub fn parse_side_table(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{value}'")),
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_tables_split_on_first_equals() {
        assert_eq!(
            parse_side_table("birthdays=data/dob=v2.csv").unwrap(),
            ("birthdays".to_string(), PathBuf::from("data/dob=v2.csv"))
        );
        assert!(parse_side_table("birthdays").is_err());
        assert!(parse_side_table("=x.csv").is_err());
    }

    #[test]
    fn parses_filter_command() {
        let cli = Cli::try_parse_from([
            "cohort",
            "--log-format",
            "json",
            "filter",
            "visits.csv",
            "--chain",
            "chain.toml",
            "--side-table",
            "birthdays=dob.csv",
            "--side-table",
            "moves=moves.csv",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormatArg::Json));
        let Command::Filter(args) = cli.command else {
            panic!("expected filter command");
        };
        assert_eq!(args.side_tables.len(), 2);
        assert_eq!(args.side_tables[1].0, "moves");
        assert!(args.output_dir.is_none());
        assert!(!args.lazy);
    }
}
