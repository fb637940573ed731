//! CLI argument definitions for the compliance engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "einv",
    version,
    about = "E-invoicing compliance engine - validate invoice batches before submission",
    long_about = "Validate e-invoicing batches against the seeded check catalog and\n\
                  tenant-authored custom checks, surface fuzzy-match investigation\n\
                  leads, and reconcile requirement coverage before clearance\n\
                  submission."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
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

    /// Allow invoice values (TRNs, amounts, counterparty names) in logs.
    ///
    /// Off by default: record-level values are replaced with a redaction
    /// token. Only enable on systems cleared to hold tax data.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the catalog and custom-check engines over a data folder.
    Run(RunArgs),

    /// Build the requirement traceability matrix and gap summary.
    Trace(TraceArgs),

    /// Fuzzy-search invoice headers for a query string.
    Search(SearchArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Folder holding headers.json, lines.json, buyers.json, checks.json
    /// and optionally custom_checks.json.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Output directory for the findings report (default: <DATA_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Evaluate and report without writing the findings report.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Exit non-zero when Critical or High exceptions are found.
    #[arg(long = "fail-on-critical")]
    pub fail_on_critical: bool,

    /// Absolute tolerance for arithmetic reconciliation checks.
    #[arg(long = "tolerance", value_name = "AMOUNT")]
    pub tolerance: Option<f64>,
}

#[derive(Parser)]
pub struct TraceArgs {
    /// Folder holding requirements.csv, controls.csv, checks.json,
    /// template.csv (or template.json), and optionally the invoice data
    /// files for population statistics.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Only print requirements with a coverage gap.
    #[arg(long = "gaps-only")]
    pub gaps_only: bool,
}

#[derive(Parser)]
pub struct SearchArgs {
    /// Folder holding headers.json.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Text to match against invoice numbers, vendor names, and TRNs.
    #[arg(long = "query", value_name = "TEXT")]
    pub query: String,

    /// Match threshold profile.
    #[arg(long = "strictness", value_enum, default_value = "balanced")]
    pub strictness: StrictnessArg,

    /// Maximum number of matches to print.
    #[arg(long = "limit", value_name = "N", default_value_t = 10)]
    pub limit: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrictnessArg {
    Strict,
    Balanced,
    Loose,
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
