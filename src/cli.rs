//! CLI arguments and subcommands for gcinfo-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Output format for configs and snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "gcinfo-exporter",
    about = "Validated before/after memory pool snapshots for garbage collection events",
    long_about = "Validated before/after memory pool snapshots for garbage collection events.\n\n\
                  Reads recorded collection events, reconciles the raw per-pool counters against \
                  the memory pool registry, reports counters that break memory accounting \
                  invariants and prints the resulting snapshots.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config, default info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Format for --show-config and snapshot output
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Parallel snapshot threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Leave full snapshot dumps out of the diagnostic log
    #[arg(long)]
    pub no_snapshot_dumps: bool,

    /// Disable internal gcinfo_* telemetry counters
    #[arg(long)]
    pub disable_telemetry: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build snapshots for every event of an event log
    Replay {
        /// Event log file (JSON)
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// Print telemetry counters in Prometheus text format afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Build the last collection of each collector
    Last {
        /// Event log file (JSON)
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// Only this collector id
        #[arg(long)]
        collector: Option<i32>,
    },

    /// Report invariant violations in an event log
    Check {
        /// Event log file (JSON)
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// Print the full diagnostic text instead of the summary table
        #[arg(long)]
        verbose: bool,

        /// Print telemetry counters in Prometheus text format afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Generate a synthetic event log
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "events.json")]
        output: PathBuf,

        /// Number of collection events to generate
        #[arg(long, default_value_t = 20)]
        events: usize,

        /// Fraction of pool samples with broken counters (0.0 - 1.0)
        #[arg(long, default_value_t = 0.0)]
        violation_rate: f64,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
