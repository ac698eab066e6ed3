//! The parsing state machine.
//!
//! ```text
//! Idle ──marker──▶ <grammar>Init ──valid──▶ Delimited / JsonContent ──close──▶ Idle
//!                        │
//!                        └──invalid──▶ Idle   (first marker char becomes text)
//! ```
//!
//! States are moved into [`ParserState::run`] and hand back their successor
//! in a [`Step`]. `finishing` is set during `finalize()`: states that would
//! wait for more input must decide instead.

pub mod delimited;
pub mod json;
pub mod sentinel;
pub mod xml;

use crate::context::ParserContext;
use crate::strategy::StrategyRegistry;

use delimited::Delimited;
use json::{JsonContent, JsonInit};
use sentinel::SentinelInit;
use xml::XmlTagInit;

/// Result of running a state once.
#[derive(Debug)]
pub enum Step {
    /// A transition happened; run the returned state next.
    Continue(ParserState),
    /// No further progress without more input.
    Suspend(ParserState),
}

/// The active parsing state.
#[derive(Debug, Default)]
pub enum ParserState {
    /// Scanning for the next marker; text is flushed as it is decided.
    #[default]
    Idle,
    /// A sentinel start literal was found.
    SentinelInit(SentinelInit),
    /// An XML-style opening tag is being validated.
    XmlTagInit(XmlTagInit),
    /// A JSON opener is being checked for a tool call.
    JsonInit(JsonInit),
    /// Inside a segment closed by a literal delimiter.
    Delimited(Delimited),
    /// A validated JSON tool call waiting to be emitted.
    JsonContent(JsonContent),
}

impl ParserState {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ParserState::Idle => "idle",
            ParserState::SentinelInit(_) => "sentinel_init",
            ParserState::XmlTagInit(_) => "xml_tag_init",
            ParserState::JsonInit(_) => "json_init",
            ParserState::Delimited(_) => "delimited",
            ParserState::JsonContent(_) => "json_content",
        }
    }

    /// Check if no marker or segment is pending.
    pub fn is_idle(&self) -> bool {
        matches!(self, ParserState::Idle)
    }

    /// Consume as much of the buffer as currently possible.
    pub fn run(self, ctx: &mut ParserContext, registry: &StrategyRegistry, finishing: bool) -> Step {
        match self {
            ParserState::Idle => run_idle(ctx, registry, finishing),
            ParserState::SentinelInit(state) => state.run(ctx),
            ParserState::XmlTagInit(state) => state.run(ctx, finishing),
            ParserState::JsonInit(state) => state.run(ctx, finishing),
            ParserState::Delimited(state) => state.run(ctx, finishing),
            ParserState::JsonContent(state) => state.run(ctx),
        }
    }
}

fn run_idle(ctx: &mut ParserContext, registry: &StrategyRegistry, finishing: bool) -> Step {
    if ctx.remaining().is_empty() {
        return Step::Suspend(ParserState::Idle);
    }

    let from = ctx.cursor();
    let found = registry.next_marker(ctx.buffer(), from);
    let hold = if finishing {
        None
    } else {
        registry.partial_marker_start(ctx.buffer(), from)
    };

    match found {
        // A marker still forming at the tail could start earlier than the
        // complete one; only commit when nothing can overtake it.
        Some(found) if hold.is_none_or(|h| found.index < h) => {
            ctx.emit_text(found.index);
            Step::Continue(registry.build_state(&found))
        }
        _ => {
            let end = hold.unwrap_or(ctx.buffer().len());
            ctx.emit_text(end);
            if hold.is_some() {
                tracing::trace!(held = ctx.remaining().len(), "holding possible marker prefix");
            }
            Step::Suspend(ParserState::Idle)
        }
    }
}

/// Give up on the marker at the cursor: its first character becomes text
/// and scanning resumes right after it.
pub(crate) fn reject_marker(ctx: &mut ParserContext, grammar: &'static str, reason: &str) -> Step {
    let first = ctx.remaining().chars().next().map_or(0, char::len_utf8);
    tracing::debug!(grammar, reason, "marker rejected, treating as text");
    ctx.emit_text(ctx.cursor() + first);
    Step::Continue(ParserState::Idle)
}

/// The longest prefix of `text` no longer than `max` bytes.
pub(crate) fn window(text: &str, max: usize) -> &str {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Length of the longest suffix of `text` that is a strict prefix of
/// `delimiter`.
pub(crate) fn partial_suffix_len(text: &str, delimiter: &str) -> usize {
    let max = delimiter.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .filter(|&k| text.is_char_boundary(text.len() - k))
        .find(|&k| delimiter.starts_with(&text[text.len() - k..]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_respects_char_boundary() {
        assert_eq!(window("a§b", 2), "a");
        assert_eq!(window("a§b", 3), "a§");
        assert_eq!(window("ab", 10), "ab");
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len("body</to", "</tool>"), 4);
        assert_eq!(partial_suffix_len("body<", "</tool>"), 1);
        assert_eq!(partial_suffix_len("body", "</tool>"), 0);
        assert_eq!(partial_suffix_len("body§", "§E§"), 2);
        assert_eq!(partial_suffix_len("", "§E§"), 0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ParserState::Idle.name(), "idle");
        assert!(ParserState::default().is_idle());
    }
}
