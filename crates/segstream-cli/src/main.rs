//! segstream - incremental segmentation of streamed LLM output
//!
//! Main entry point for the segstream CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use segstream_config::{ConfigSource, LoadedConfig, LoggingConfig};

mod commands;

use commands::{config, parse};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// segstream - split streamed model output into text, tool calls and files
#[derive(Parser)]
#[command(name = "segstream")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this config file instead of discovering one
    #[arg(long, global = true, env = "SEGSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Segment a response read from a file or stdin
    Parse(parse::ParseArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => {
            let config = segstream_config::load_config_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.clone(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            }
        }
        None => segstream_config::load_config(None).context("Failed to load configuration")?,
    };

    let _guard = init_tracing(&loaded.config.logging_or_default(), cli.verbose);
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded.sources,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Parse(args) => parse::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}

/// Console logging on stderr, plus a daily-rolled JSON file when configured.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(
    logging: &LoggingConfig,
    verbose: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let default_filter = if verbose {
        "segstream=debug,segstream_config=debug,segstream_cli=debug,info".to_string()
    } else {
        logging.level.clone()
    };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let (file_layer, guard) = match &logging.file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "segstream.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "segstream=trace,segstream_config=trace,segstream_cli=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
