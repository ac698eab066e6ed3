//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use segstream_config::SegstreamConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration, defaults filled in
    Show,

    /// Show which config files were consulted and their precedence
    Path,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn effective(config: &SegstreamConfig) -> SegstreamConfig {
    SegstreamConfig {
        parser: Some(config.parser_or_default()),
        logging: Some(config.logging_or_default()),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = effective(&ctx.config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let loaded: Vec<_> = ctx.sources.iter().filter(|s| s.loaded).collect();
    if loaded.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in loaded {
            println!("# Loaded from {}", source.path.display());
        }
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let sources: Vec<_> = ctx
            .sources
            .iter()
            .map(|s| serde_json::json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config file search order (later overrides earlier):\n");
    for source in &ctx.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = ctx.sources.iter().filter(|s| s.loaded).count();
    if loaded_count == 0 {
        println!("No config files found.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }
    Ok(())
}
