//! Runtime configuration for the segmentation engine.

use segstream_config::{DEFAULT_MAX_JSON_LEN, DEFAULT_MAX_MARKER_LEN, GrammarName, ParserSection};

use crate::error::{Result, SegmentError};
use crate::profile::JsonProfile;
use crate::segment::{Metadata, SegmentKind};
use crate::state::xml::XmlTag;

/// A caller-registered sentinel block type.
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelSpec {
    /// Opening literal.
    pub start: String,
    /// Closing literal.
    pub end: String,
    /// Kind of the segments it produces.
    pub kind: SegmentKind,
    /// Metadata attached to every segment it produces.
    pub metadata: Metadata,
}

impl SentinelSpec {
    /// Create a sentinel with empty metadata.
    pub fn new(start: impl Into<String>, end: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            kind,
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Configuration consumed when building a parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Enabled grammars in priority order.
    pub strategies: Vec<GrammarName>,
    /// Whether tool-call detection is active.
    pub tool_calls: bool,
    /// Wire shape for raw JSON tool calls.
    pub json_profile: JsonProfile,
    /// Longest opening marker held back while undecided.
    pub max_marker_len: usize,
    /// Longest raw JSON tool call scanned before it is given up as text.
    pub max_json_len: usize,
    /// Sentinel block types, in registration order.
    pub sentinels: Vec<SentinelSpec>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                GrammarName::Sentinel,
                GrammarName::XmlTag,
                GrammarName::JsonToolCall,
            ],
            tool_calls: true,
            json_profile: JsonProfile::Default,
            max_marker_len: DEFAULT_MAX_MARKER_LEN,
            max_json_len: DEFAULT_MAX_JSON_LEN,
            sentinels: Vec::new(),
        }
    }
}

impl ParserConfig {
    /// Create a config with all grammars enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enabled grammars and their priority.
    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = GrammarName>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    /// Enable or disable tool-call detection.
    pub fn with_tool_calls(mut self, enabled: bool) -> Self {
        self.tool_calls = enabled;
        self
    }

    /// Set the JSON tool-call profile.
    pub fn with_json_profile(mut self, profile: JsonProfile) -> Self {
        self.json_profile = profile;
        self
    }

    /// Set the marker lookahead limit.
    pub fn with_max_marker_len(mut self, len: usize) -> Self {
        self.max_marker_len = len;
        self
    }

    /// Set the raw JSON tool-call length limit.
    pub fn with_max_json_len(mut self, len: usize) -> Self {
        self.max_json_len = len;
        self
    }

    /// Register a sentinel block type.
    pub fn with_sentinel(mut self, sentinel: SentinelSpec) -> Self {
        self.sentinels.push(sentinel);
        self
    }

    /// Build from the `[parser]` config section.
    pub fn from_section(section: &ParserSection) -> Result<Self> {
        section.validate()?;

        let sentinels = section
            .sentinels
            .iter()
            .map(|s| {
                Ok(SentinelSpec {
                    start: s.start.clone(),
                    end: s.end.clone(),
                    kind: s.kind.parse()?,
                    metadata: s.metadata.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let config = Self {
            strategies: section.strategies.clone(),
            tool_calls: section.tool_calls,
            json_profile: section.json_profile.into(),
            max_marker_len: section.max_marker_len,
            max_json_len: section.max_json_len,
            sentinels,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check for settings no parser can run with.
    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(SegmentError::config("at least one grammar must be enabled"));
        }
        let min_marker_len = self.min_marker_len().max(1);
        if self.max_marker_len < min_marker_len {
            return Err(SegmentError::config(format!(
                "max_marker_len must be at least {min_marker_len} for the enabled grammars"
            )));
        }
        if self.max_json_len == 0 {
            return Err(SegmentError::config("max_json_len must be positive"));
        }
        for sentinel in &self.sentinels {
            if sentinel.start.is_empty() || sentinel.end.is_empty() {
                return Err(SegmentError::config("sentinel literals must be non-empty"));
            }
            if !sentinel.kind.is_structured() {
                return Err(SegmentError::config(format!(
                    "sentinel '{}' must produce a structured kind",
                    sentinel.start
                )));
            }
        }
        Ok(())
    }

    /// Shortest lookahead that still lets every enabled opening marker
    /// validate: the shortest complete XML opening tag and the longest JSON
    /// trigger.
    pub fn min_marker_len(&self) -> usize {
        let mut len = 0;
        if self.strategies.contains(&GrammarName::XmlTag) {
            len = XmlTag::ALL
                .iter()
                .filter(|t| self.tool_calls || t.kind() != SegmentKind::ToolCall)
                .map(XmlTag::shortest_opening_len)
                .max()
                .unwrap_or(0);
        }
        if self.tool_calls && self.strategies.contains(&GrammarName::JsonToolCall) {
            len = len.max(self.json_profile.longest_trigger_len());
        }
        len
    }
}
