//! Marker detection strategies and the registry that dispatches between them.
//!
//! Each [`Strategy`] is a stateless scanner for one grammar. When the parser
//! is idle, the [`StrategyRegistry`] asks every enabled strategy for its
//! nearest opening marker and picks the lowest buffer index; ties go to the
//! strategy declared first in the configuration.

use segstream_config::GrammarName;

use crate::config::{ParserConfig, SentinelSpec};
use crate::profile::JsonProfile;
use crate::segment::SegmentKind;
use crate::state::json::JsonInit;
use crate::state::sentinel::SentinelInit;
use crate::state::xml::{XmlTag, XmlTagInit};
use crate::state::ParserState;

/// A located opening marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerMatch {
    /// Absolute buffer offset where the marker begins.
    pub index: usize,
    /// Which marker was found.
    pub marker: Marker,
}

/// Grammar-specific identity of a located marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Start literal of the sentinel at this registration index.
    Sentinel(usize),
    /// An XML-style opening tag.
    XmlTag(XmlTag),
    /// A JSON opener (`{` or `[`).
    Json,
}

/// One grammar's marker scanner.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Caller-registered literal pairs.
    Sentinel(Vec<SentinelSpec>),
    /// XML-style tags.
    XmlTag(Vec<XmlTag>),
    /// Raw JSON tool calls.
    JsonToolCall(JsonProfile),
}

impl Strategy {
    /// Grammar this strategy scans for.
    pub fn grammar(&self) -> GrammarName {
        match self {
            Strategy::Sentinel(_) => GrammarName::Sentinel,
            Strategy::XmlTag(_) => GrammarName::XmlTag,
            Strategy::JsonToolCall(_) => GrammarName::JsonToolCall,
        }
    }

    /// Nearest marker at or after `from`.
    pub fn next_marker(&self, buffer: &str, from: usize) -> Option<MarkerMatch> {
        let haystack = &buffer[from..];
        match self {
            Strategy::Sentinel(specs) => {
                let mut best: Option<(usize, usize)> = None;
                for (i, spec) in specs.iter().enumerate() {
                    let Some(pos) = haystack.find(spec.start.as_str()) else {
                        continue;
                    };
                    // Equal positions prefer the longer literal, then registration order.
                    let better = match best {
                        None => true,
                        Some((best_pos, best_i)) => {
                            pos < best_pos
                                || (pos == best_pos && spec.start.len() > specs[best_i].start.len())
                        }
                    };
                    if better {
                        best = Some((pos, i));
                    }
                }
                best.map(|(pos, i)| MarkerMatch {
                    index: from + pos,
                    marker: Marker::Sentinel(i),
                })
            }
            Strategy::XmlTag(tags) => tags
                .iter()
                .filter_map(|tag| haystack.find(tag.opening()).map(|pos| (pos, *tag)))
                .min_by_key(|(pos, _)| *pos)
                .map(|(pos, tag)| MarkerMatch {
                    index: from + pos,
                    marker: Marker::XmlTag(tag),
                }),
            Strategy::JsonToolCall(profile) => haystack
                .find(profile.openers())
                .map(|pos| MarkerMatch {
                    index: from + pos,
                    marker: Marker::Json,
                }),
        }
    }

    /// Earliest offset at or after `from` where the buffer tail is a strict
    /// prefix of one of this strategy's opening markers.
    pub fn partial_marker_start(&self, buffer: &str, from: usize) -> Option<usize> {
        match self {
            Strategy::Sentinel(specs) => specs
                .iter()
                .filter_map(|spec| tail_prefix_start(buffer, from, &spec.start))
                .min(),
            Strategy::XmlTag(tags) => tags
                .iter()
                .filter_map(|tag| tail_prefix_start(buffer, from, tag.opening()))
                .min(),
            // Openers are single characters: a match is always complete.
            Strategy::JsonToolCall(_) => None,
        }
    }
}

/// Earliest `k >= from` such that `buffer[k..]` is a non-empty strict prefix
/// of `marker`.
fn tail_prefix_start(buffer: &str, from: usize, marker: &str) -> Option<usize> {
    let lower = buffer.len().saturating_sub(marker.len().saturating_sub(1)).max(from);
    (lower..buffer.len())
        .filter(|&k| buffer.is_char_boundary(k))
        .find(|&k| marker.starts_with(&buffer[k..]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// The enabled strategies for one configuration, in priority order.
///
/// Immutable once built; share it across parsers with an `Arc`.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Strategy>,
    json_profile: JsonProfile,
    max_marker_len: usize,
    max_json_len: usize,
}

impl StrategyRegistry {
    /// Build the registry for a configuration.
    ///
    /// When tool-call detection is off, the JSON grammar, the `<tool>` tag
    /// and tool-call sentinels are left out.
    pub fn from_config(config: &ParserConfig) -> Self {
        let mut strategies = Vec::new();
        let mut seen = Vec::new();

        for grammar in &config.strategies {
            if seen.contains(grammar) {
                continue;
            }
            seen.push(*grammar);

            match grammar {
                GrammarName::Sentinel => {
                    let specs: Vec<SentinelSpec> = config
                        .sentinels
                        .iter()
                        .filter(|s| config.tool_calls || s.kind != SegmentKind::ToolCall)
                        .cloned()
                        .collect();
                    if !specs.is_empty() {
                        strategies.push(Strategy::Sentinel(specs));
                    }
                }
                GrammarName::XmlTag => {
                    let tags = XmlTag::ALL
                        .iter()
                        .copied()
                        .filter(|t| config.tool_calls || t.kind() != SegmentKind::ToolCall)
                        .collect();
                    strategies.push(Strategy::XmlTag(tags));
                }
                GrammarName::JsonToolCall => {
                    if config.tool_calls {
                        strategies.push(Strategy::JsonToolCall(config.json_profile));
                    }
                }
            }
        }

        tracing::debug!(
            strategies = ?strategies.iter().map(Strategy::grammar).collect::<Vec<_>>(),
            profile = ?config.json_profile,
            "strategy registry built"
        );

        Self {
            strategies,
            json_profile: config.json_profile,
            max_marker_len: config.max_marker_len,
            max_json_len: config.max_json_len,
        }
    }

    /// Enabled strategies in priority order.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Nearest marker across all strategies; ties go to declaration order.
    pub fn next_marker(&self, buffer: &str, from: usize) -> Option<MarkerMatch> {
        let mut best: Option<MarkerMatch> = None;
        for strategy in &self.strategies {
            if let Some(found) = strategy.next_marker(buffer, from)
                && best.as_ref().is_none_or(|b| found.index < b.index)
            {
                best = Some(found);
            }
        }
        best
    }

    /// Earliest offset where a marker may still be forming at the buffer tail.
    pub fn partial_marker_start(&self, buffer: &str, from: usize) -> Option<usize> {
        self.strategies
            .iter()
            .filter_map(|s| s.partial_marker_start(buffer, from))
            .min()
    }

    /// Construct the state that owns a located marker.
    pub fn build_state(&self, found: &MarkerMatch) -> ParserState {
        match &found.marker {
            Marker::Sentinel(i) => {
                let spec = self
                    .strategies
                    .iter()
                    .find_map(|s| match s {
                        Strategy::Sentinel(specs) => specs.get(*i),
                        _ => None,
                    })
                    .cloned();
                match spec {
                    Some(spec) => ParserState::SentinelInit(SentinelInit::new(spec, self.json_profile)),
                    None => ParserState::Idle,
                }
            }
            Marker::XmlTag(tag) => ParserState::XmlTagInit(XmlTagInit::new(*tag, self.max_marker_len)),
            Marker::Json => ParserState::JsonInit(JsonInit::new(
                self.json_profile,
                self.max_marker_len,
                self.max_json_len,
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
