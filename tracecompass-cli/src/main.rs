//! Trace-Compass Plugin Harness CLI
//!
//! Command-line harness that stands in for the trace-processing host. It
//! uses the tracecompass-plugin library and adds:
//! - Loading an external plugin build (shared library)
//! - Registering the plugin callbacks into an in-process table
//! - Dispatching synthetic host/device events across worker threads
//! - Report generation (TXT/JSON)

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;

mod config;
mod harness;
mod plugin;
mod report;

use config::{HarnessConfig, OutputFormat};
use harness::Harness;

/// Trace-Compass Plugin Harness - register and exercise plugin callbacks
#[derive(Parser, Debug)]
#[command(name = "tracecompass-cli")]
#[command(about = "Register trace-compass plugin callbacks and dispatch synthetic events", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (harness.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Plugin shared library to load instead of the linked-in plugin
    #[arg(short, long, value_name = "LIB")]
    plugin: Option<PathBuf>,

    /// Number of dispatch rounds
    #[arg(short = 'n', long, value_name = "COUNT")]
    iterations: Option<u64>,

    /// Number of dispatch worker threads
    #[arg(short, long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Register the callbacks twice
    #[arg(long)]
    register_twice: bool,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Trace-Compass Plugin Harness v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using plugin library v{}", tracecompass_plugin::VERSION);

    let config = resolve_config(&args)?;
    config.validate()?;
    log::debug!("Configuration: {:?}", config);

    let harness = Harness::new(config.clone())?;
    let report = harness.run()?;

    report::write_report(
        &report,
        config.output.format,
        config.output.output_file.as_deref(),
    )?;

    Ok(())
}

/// Load the config file (if any) and apply command-line overrides
fn resolve_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => HarnessConfig::default(),
    };

    if let Some(plugin) = &args.plugin {
        config.plugin.library = Some(plugin.clone());
    }
    if args.register_twice {
        config.plugin.register_twice = true;
    }
    if let Some(iterations) = args.iterations {
        config.dispatch.iterations = iterations;
    }
    if let Some(threads) = args.threads {
        config.dispatch.threads = threads;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(output) = &args.output {
        config.output.output_file = Some(output.clone());
    }

    Ok(config)
}

/// Map `-v`/`-q` to a level filter
fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Initialize logging; `RUST_LOG` directives refine the `-v`/`-q` level
fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level(verbose, quiet));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder
        .format(|buf, record| {
            writeln!(buf, "[{:<5} {}] {}", record.level(), record.target(), record.args())
        })
        .init();
}
