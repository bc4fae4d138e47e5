//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Streamcast - fan diagnostic output from many threads into shared sinks
#[derive(Parser, Debug)]
#[command(
    name = "streamcast",
    author,
    version,
    about = "Diagnostic output broadcaster",
    long_about = "Builds a broadcast topology from configuration and exercises it.\n\n\
                  Channels owned by worker threads fan every flushed message out to \n\
                  shared sinks without ever holding more than one sink lock."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAMCAST_VERBOSE")]
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
        env = "STREAMCAST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a multi-threaded broadcast workload against the topology
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the configured sinks and channels
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "streamcast.toml",
        env = "STREAMCAST_CONFIG"
    )]
    pub config: PathBuf,

    /// Worker threads, each owning one instance of every channel
    #[arg(short, long, default_value = "4", env = "STREAMCAST_THREADS")]
    pub threads: usize,

    /// Messages flushed per channel per thread
    #[arg(short, long, default_value = "1000", env = "STREAMCAST_MESSAGES")]
    pub messages: u64,

    /// Only open these channels (repeatable); all when omitted
    #[arg(long = "channel")]
    pub channels: Vec<String>,

    /// Override the sink table capacity from configuration
    #[arg(long, env = "STREAMCAST_SINK_TABLE_CAPACITY")]
    pub sink_table_capacity: Option<usize>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STREAMCAST_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "streamcast.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "streamcast.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
