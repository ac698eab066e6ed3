//! Parse command - segment a recorded response.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};

use segstream::{JsonProfile, ParserConfig, SegmentEvent, StreamingParser, ToolInvocation};

use super::Context;

/// Arguments for the parse command.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Input file (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Feed the input in fragments of this many characters
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// JSON tool-call profile (overrides config)
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    /// Disable tool-call detection
    #[arg(long)]
    pub no_tools: bool,
}

/// JSON tool-call profile names accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProfileArg {
    Default,
    Gemini,
    Openai,
}

impl From<ProfileArg> for JsonProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Default => JsonProfile::Default,
            ProfileArg::Gemini => JsonProfile::Gemini,
            ProfileArg::Openai => JsonProfile::OpenAi,
        }
    }
}

/// Run the parse command.
pub fn run(args: ParseArgs, ctx: &Context) -> Result<()> {
    let input = read_input(args.file.as_ref())?;

    let mut config = ParserConfig::from_section(&ctx.config.parser_or_default())
        .context("Invalid [parser] configuration")?;
    if let Some(profile) = args.profile {
        config = config.with_json_profile(profile.into());
    }
    if args.no_tools {
        config = config.with_tool_calls(false);
    }

    let mut parser = StreamingParser::new(config).context("Failed to build parser")?;
    let chunks = split_chunks(&input, args.chunk_size.map(|n| n as usize));
    tracing::debug!(bytes = input.len(), chunks = chunks.len(), "parsing input");

    for chunk in &chunks {
        for event in parser.feed(chunk)? {
            print_event(&event, ctx)?;
        }
    }
    for event in parser.finalize()? {
        print_event(&event, ctx)?;
    }

    for invocation in parser.all_invocations() {
        print_invocation(invocation, ctx)?;
    }

    if !ctx.json_output && ctx.verbose {
        println!(
            "\n{} event(s), {} invocation(s)",
            parser.all_events().len(),
            parser.all_invocations().len()
        );
    }

    Ok(())
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Split into fragments of `size` characters; the whole input when `None`.
fn split_chunks(input: &str, size: Option<usize>) -> Vec<&str> {
    let Some(size) = size else {
        return vec![input];
    };

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in input.char_indices() {
        if count == size {
            chunks.push(&input[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < input.len() {
        chunks.push(&input[start..]);
    }
    chunks
}

fn print_event(event: &SegmentEvent, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        SegmentEvent::Start {
            segment_id,
            kind,
            metadata,
        } => {
            if metadata.is_empty() {
                println!("[{}] START {}", segment_id, kind);
            } else {
                println!(
                    "[{}] START {} {}",
                    segment_id,
                    kind,
                    serde_json::to_string(metadata)?
                );
            }
        }
        SegmentEvent::Content { segment_id, delta } => {
            println!("[{}] CONTENT {:?}", segment_id, delta);
        }
        SegmentEvent::End {
            segment_id,
            kind,
            metadata,
        } => {
            if metadata.is_empty() {
                println!("[{}] END {}", segment_id, kind);
            } else {
                println!(
                    "[{}] END {} {}",
                    segment_id,
                    kind,
                    serde_json::to_string(metadata)?
                );
            }
        }
    }
    Ok(())
}

fn print_invocation(invocation: &ToolInvocation, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let line = serde_json::json!({ "type": "invocation", "invocation": invocation });
        println!("{}", line);
    } else {
        println!(
            "invocation {} {} {}",
            invocation.id,
            invocation.name,
            serde_json::to_string(&invocation.arguments)?
        );
    }
    Ok(())
}
