//! Configuration loading and validation.
//!
//! Precedence is CLI (if provided) > config file > defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::cli::{Args, OutputFormat};

const MAX_PARALLELISM: usize = 1024;

const DEFAULT_LOCATIONS: [&str; 6] = [
    "/etc/gcinfo/gcinfo-exporter.yaml",
    "/etc/gcinfo/gcinfo-exporter.yml",
    "/etc/gcinfo/gcinfo-exporter.json",
    "./gcinfo-exporter.yaml",
    "./gcinfo-exporter.yml",
    "./gcinfo-exporter.json",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Logging
    pub log_level: Option<String>,
    /// Include full snapshot dumps in the diagnostic log
    #[serde(alias = "snapshot-dumps")]
    pub snapshot_dumps: Option<bool>,

    // Processing
    pub parallelism: Option<usize>,

    // Output
    #[serde(alias = "output-format")]
    pub output_format: Option<OutputFormat>,

    // Feature flags
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            snapshot_dumps: Some(true),
            parallelism: None,
            output_format: Some(OutputFormat::Yaml),
            enable_telemetry: Some(true),
        }
    }
}

impl Config {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or(OutputFormat::Yaml)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if let Some(threads) = cfg.parallelism {
        if threads > MAX_PARALLELISM {
            bail!("parallelism {threads} exceeds the maximum of {MAX_PARALLELISM}");
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => bail!(
                "Invalid log_level '{other}', expected one of off/error/warn/info/debug/trace"
            ),
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
///
/// Also returns the file the config was read from, if any.
pub fn resolve_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) = if args.no_config {
        (Config::default(), None)
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if let Some(threads) = args.parallelism {
        config.parallelism = Some(threads);
    }
    if let Some(format) = args.format {
        config.output_format = Some(format);
    }
    if args.no_snapshot_dumps {
        config.snapshot_dumps = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    Ok((config, source))
}

/// Configuration loading with YAML/JSON/TOML support
pub fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_LOCATIONS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok((Config::default(), None)),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok((config, Some(path)))
}

fn parse_config(content: &str, extension: Option<&str>) -> Result<Config> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders any serializable value in the requested format
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Toml => toml::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(output)
}
