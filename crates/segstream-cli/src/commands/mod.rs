//! CLI command handlers.

pub mod config;
pub mod parse;

use segstream_config::{ConfigSource, SegstreamConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective merged configuration.
    pub config: SegstreamConfig,
    /// Config files consulted, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
