//! CLI command implementations for gcinfo-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `replay`: Snapshots for every recorded event
//! - `last`: Most recent snapshot per collector
//! - `check`: Invariant violation report
//! - `generate-testdata`: Synthetic event log generation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod generate;
pub mod last;
pub mod replay;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use last::command_last;
pub use replay::command_replay;
