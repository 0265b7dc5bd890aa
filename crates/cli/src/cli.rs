//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// evt-filter - filter plugin events on a worker pool
#[derive(Parser, Debug)]
#[command(
    name = "evt-filter",
    author,
    version,
    about = "Filtered plugin-event dispatch pipeline",
    long_about = "Streams plugin events through a compiled filter expression.\n\n\
                  Events are evaluated on a pool of worker threads with an inline \n\
                  fallback; accepted events are written in submission order."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVT_FILTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVT_FILTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter an event stream
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Compile a filter expression and report syntax errors
    Check(CheckArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "EVT_FILTER_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines event file
    #[arg(short, long, env = "EVT_FILTER_EVENTS")]
    pub events: PathBuf,

    /// Override the filter expression from configuration
    #[arg(long, env = "EVT_FILTER_EXPR")]
    pub filter: Option<String>,

    /// Override the number of background workers
    #[arg(long, env = "EVT_FILTER_WORKERS")]
    pub workers: Option<usize>,

    /// Write accepted events here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVT_FILTER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed source information
    #[arg(long)]
    pub sources: bool,
}

/// Arguments for the `check` command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Filter expression to compile
    #[arg(short, long)]
    pub expr: String,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
