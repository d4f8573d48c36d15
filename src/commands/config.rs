//! Config command implementation.
//!
//! Writes a default configuration file.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::config::{render, Config};

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: OutputFormat, commented: bool) -> Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| {
        PathBuf::from(match format {
            OutputFormat::Json => "gcinfo-exporter.json",
            OutputFormat::Toml => "gcinfo-exporter.toml",
            OutputFormat::Yaml => "gcinfo-exporter.yaml",
        })
    });

    let mut content = render(&config, format)?;
    if commented && format == OutputFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# gcinfo-exporter Configuration
# =============================
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
# snapshot_dumps: true         # Log raw values of all pools when a sample is invalid
#
# Processing
# ----------
# parallelism: null            # Parallel snapshot threads (null = auto)
#
# Output
# ------
# output_format: yaml          # yaml, json or toml
#
# Feature Flags
# -------------
# enable_telemetry: true       # Count diagnostics in gcinfo_* metrics
"#;

    format!("{comments}\n{yaml}")
}
