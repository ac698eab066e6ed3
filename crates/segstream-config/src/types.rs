//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [parser]                 # segmentation engine settings
//! [[parser.sentinels]]     # caller-registered sentinel blocks
//! [logging]                # CLI log output
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegstreamConfig {
    /// Segmentation engine configuration.
    pub parser: Option<ParserSection>,

    /// Log output configuration.
    pub logging: Option<LoggingConfig>,
}

impl SegstreamConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: SegstreamConfig) {
        if other.parser.is_some() {
            self.parser = other.parser;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The parser section, or defaults when absent.
    pub fn parser_or_default(&self) -> ParserSection {
        self.parser.clone().unwrap_or_default()
    }

    /// The logging section, or defaults when absent.
    pub fn logging_or_default(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default upper bound, in bytes, on an opening marker awaiting validation.
pub const DEFAULT_MAX_MARKER_LEN: usize = 1024;

/// Default upper bound, in bytes, on a raw JSON tool call.
pub const DEFAULT_MAX_JSON_LEN: usize = 64 * 1024;

/// Segmentation engine settings (the `[parser]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSection {
    /// Enabled grammars. Order is priority: on a tie at the same buffer
    /// index the earlier entry wins.
    pub strategies: Vec<GrammarName>,
    /// Whether tool-call detection is active at all.
    pub tool_calls: bool,
    /// Wire shape expected from raw JSON tool calls.
    pub json_profile: JsonProfileName,
    /// Longest opening marker (tag or JSON trigger) held back while
    /// undecided before it is given up as text.
    pub max_marker_len: usize,
    /// Longest raw JSON blob scanned after a trigger before it is given up
    /// as text.
    pub max_json_len: usize,
    /// Sentinel-delimited block definitions.
    pub sentinels: Vec<SentinelSection>,
}

impl Default for ParserSection {
    fn default() -> Self {
        Self {
            strategies: vec![
                GrammarName::Sentinel,
                GrammarName::XmlTag,
                GrammarName::JsonToolCall,
            ],
            tool_calls: true,
            json_profile: JsonProfileName::Default,
            max_marker_len: DEFAULT_MAX_MARKER_LEN,
            max_json_len: DEFAULT_MAX_JSON_LEN,
            sentinels: Vec::new(),
        }
    }
}

impl ParserSection {
    /// Check the section for values no parser can be built from.
    pub fn validate(&self) -> crate::Result<()> {
        if self.strategies.is_empty() {
            return Err(crate::ConfigError::Other(
                "parser.strategies must name at least one grammar".to_string(),
            ));
        }

        for (index, sentinel) in self.sentinels.iter().enumerate() {
            if sentinel.start.is_empty() || sentinel.end.is_empty() {
                return Err(crate::ConfigError::InvalidSentinel {
                    index,
                    reason: "start and end literals must be non-empty".to_string(),
                });
            }
            if sentinel.kind.trim().is_empty() {
                return Err(crate::ConfigError::InvalidSentinel {
                    index,
                    reason: "kind must be set".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Supported marker grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarName {
    /// Caller-registered start/end literal pairs.
    Sentinel,
    /// `<tool name="...">`, `<write_file path="...">`, `<patch_file path="...">`.
    XmlTag,
    /// Raw JSON objects or arrays shaped like a tool call.
    JsonToolCall,
}

impl GrammarName {
    /// Name as written in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrammarName::Sentinel => "sentinel",
            GrammarName::XmlTag => "xml_tag",
            GrammarName::JsonToolCall => "json_tool_call",
        }
    }
}

impl std::fmt::Display for GrammarName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor wire shapes for raw JSON tool calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonProfileName {
    /// `{"tool": {"function": ..., "parameters": ...}}`
    #[default]
    Default,
    /// `[{"name": ..., "args": ...}, ...]`
    Gemini,
    /// `{"tool_calls": [{"id", "function": {"name", "arguments"}}]}`
    Openai,
}

impl std::fmt::Display for JsonProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JsonProfileName::Default => "default",
            JsonProfileName::Gemini => "gemini",
            JsonProfileName::Openai => "openai",
        })
    }
}

/// One sentinel-delimited block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelSection {
    /// Opening literal.
    pub start: String,
    /// Closing literal.
    pub end: String,
    /// Segment kind produced for the block (`write_file`, `tool_call`, ...).
    pub kind: String,
    /// Metadata attached to every block of this type.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rolled JSON log files. Console only when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
