// gcinfo-exporter - version 0.1.0
// Garbage collection memory snapshots with tracing logging
use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, Level};

mod cli;
mod commands;
mod config;
mod metrics;

use cli::{Args, Commands};
use config::{render, resolve_config, validate_effective_config, Config};
use metrics::TelemetrySink;

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(config: &Config) {
    let name = config.log_level.as_deref().unwrap_or("info");
    let log_level = match name {
        "off" => return,
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return;
    }

    info!("Logging initialized with level: {}", name);
}

/// Configure parallel processing thread pool if specified
fn setup_thread_pool(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        println!("{}", render(&config, config.output_format())?);
        return Ok(());
    }

    setup_logging(&config);
    match &config_source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No config file loaded, using defaults and CLI flags"),
    }
    setup_thread_pool(&config);

    let telemetry = if config.enable_telemetry.unwrap_or(true) {
        Some(TelemetrySink::new()?)
    } else {
        None
    };

    let Some(command) = args.command else {
        eprintln!("No command given, see --help");
        std::process::exit(2);
    };

    match command {
        Commands::Replay { input, metrics } => {
            commands::command_replay(&input, metrics, &config, telemetry.as_ref())
        }
        Commands::Last { input, collector } => {
            commands::command_last(&input, collector, &config, telemetry.as_ref())
        }
        Commands::Check {
            input,
            verbose,
            metrics,
        } => {
            if !commands::command_check(&input, verbose, metrics, telemetry.as_ref())? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::GenerateTestdata {
            output,
            events,
            violation_rate,
        } => commands::command_generate_testdata(output, events, violation_rate),
        Commands::Config { output, commented } => {
            commands::command_config(output, config.output_format(), commented)
        }
    }
}
