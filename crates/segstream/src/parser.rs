//! The streaming facade.
//!
//! [`StreamingParser`] owns one stream: feed it fragments as they arrive,
//! call [`finalize`](StreamingParser::finalize) once the stream ends, and
//! [`reset`](StreamingParser::reset) before reusing it.

use std::sync::Arc;

use crate::config::ParserConfig;
use crate::context::ParserContext;
use crate::error::{Result, SegmentError};
use crate::invocation::{InvocationAdapter, ToolInvocation, TurnId};
use crate::segment::SegmentEvent;
use crate::state::{ParserState, Step};
use crate::strategy::StrategyRegistry;

/// Incremental segmentation of one response stream.
///
/// # Example
///
/// ```
/// use segstream::{ParserConfig, SegmentKind, StreamingParser};
///
/// let mut parser = StreamingParser::new(ParserConfig::default()).unwrap();
/// let mut events = parser.feed("Let me check. <tool name=\"ls\">").unwrap();
/// events.extend(parser.feed("</tool> Done.").unwrap());
/// events.extend(parser.finalize().unwrap());
///
/// assert_eq!(parser.all_invocations()[0].name, "ls");
/// assert!(events.iter().any(|e| matches!(
///     e,
///     segstream::SegmentEvent::Start { kind: SegmentKind::ToolCall, .. }
/// )));
/// ```
#[derive(Debug)]
pub struct StreamingParser {
    registry: Arc<StrategyRegistry>,
    ctx: ParserContext,
    state: ParserState,
    adapter: InvocationAdapter,
    events: Vec<SegmentEvent>,
    invocations: Vec<ToolInvocation>,
    finalized: bool,
}

impl StreamingParser {
    /// Build a parser from a configuration.
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_registry(Arc::new(StrategyRegistry::from_config(&config))))
    }

    /// Build a parser sharing an existing registry.
    pub fn with_registry(registry: Arc<StrategyRegistry>) -> Self {
        Self {
            registry,
            ctx: ParserContext::new(),
            state: ParserState::Idle,
            adapter: InvocationAdapter::new(),
            events: Vec::new(),
            invocations: Vec::new(),
            finalized: false,
        }
    }

    /// The registry this parser dispatches through.
    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    /// Tag subsequent invocations with a turn.
    pub fn set_turn_id(&mut self, turn_id: Option<TurnId>) {
        self.adapter.set_turn_id(turn_id);
    }

    /// Append a fragment and return the events it completes.
    ///
    /// An empty fragment is a no-op.
    pub fn feed(&mut self, fragment: &str) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(SegmentError::AlreadyFinalized);
        }
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        self.ctx.append(fragment);
        self.drive(false);
        self.ctx.compact();
        Ok(self.collect())
    }

    /// End the stream: decide pending markers, close open segments and
    /// return the final events.
    ///
    /// Open structured segments end with `truncated: true`.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(SegmentError::AlreadyFinalized);
        }

        self.drive(true);
        self.ctx.close_text();
        self.ctx.compact();
        self.finalized = true;
        let events = self.collect();
        tracing::debug!(
            events = self.events.len(),
            invocations = self.invocations.len(),
            "stream finalized"
        );
        Ok(events)
    }

    /// Return to the freshly constructed state, keeping the registry.
    ///
    /// Clears the turn ID as well.
    pub fn reset(&mut self) {
        self.ctx.clear();
        self.state = ParserState::Idle;
        self.adapter.set_turn_id(None);
        self.events.clear();
        self.invocations.clear();
        self.finalized = false;
    }

    /// Every event produced since construction or the last reset.
    pub fn all_events(&self) -> &[SegmentEvent] {
        &self.events
    }

    /// Every invocation produced since construction or the last reset.
    pub fn all_invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Check if `finalize` has run since construction or the last reset.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn drive(&mut self, finishing: bool) {
        let mut state = std::mem::take(&mut self.state);
        loop {
            tracing::trace!(state = state.name(), cursor = self.ctx.cursor(), "run");
            match state.run(&mut self.ctx, &self.registry, finishing) {
                Step::Continue(next) => state = next,
                Step::Suspend(next) => {
                    state = next;
                    break;
                }
            }
        }
        self.state = state;
    }

    fn collect(&mut self) -> Vec<SegmentEvent> {
        let events = self.ctx.take_events();
        for event in &events {
            self.invocations.extend(self.adapter.adapt(event));
        }
        self.events.extend(events.iter().cloned());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{META_TRUNCATED, SegmentKind, assemble_segments};
    use segstream_config::GrammarName;

    fn parser() -> StreamingParser {
        StreamingParser::new(ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_text() {
        let mut parser = parser();
        let events = parser.feed("hello world").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].delta(), Some("hello world"));

        let events = parser.finalize().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_end());
    }

    #[test]
    fn test_empty_fragment_is_noop() {
        let mut parser = parser();
        assert!(parser.feed("").unwrap().is_empty());
        assert!(parser.all_events().is_empty());
    }

    #[test]
    fn test_feed_after_finalize_fails() {
        let mut parser = parser();
        parser.feed("x").unwrap();
        parser.finalize().unwrap();
        assert!(parser.is_finalized());
        assert!(matches!(parser.feed("y"), Err(SegmentError::AlreadyFinalized)));
        assert!(matches!(parser.finalize(), Err(SegmentError::AlreadyFinalized)));
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut parser = parser();
        parser.set_turn_id(Some(TurnId::new()));
        parser.feed("<tool name=\"a\"></tool>").unwrap();
        parser.finalize().unwrap();
        assert_eq!(parser.all_invocations().len(), 1);

        parser.reset();
        assert!(!parser.is_finalized());
        assert!(parser.all_events().is_empty());
        assert!(parser.all_invocations().is_empty());

        let events = parser.feed("again").unwrap();
        assert_eq!(events[0].segment_id(), "seg_1");
        parser.feed("<tool name=\"b\"></tool>").unwrap();
        assert_eq!(parser.all_invocations()[0].turn_id, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ParserConfig::default().with_strategies(Vec::<GrammarName>::new());
        assert!(matches!(StreamingParser::new(config), Err(SegmentError::Config(_))));
    }

    #[test]
    fn test_truncated_write_file() {
        let mut parser = parser();
        parser.feed("<write_file path=\"a.txt\">partial").unwrap();
        parser.finalize().unwrap();

        let segments = assemble_segments(parser.all_events());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::WriteFile);
        assert_eq!(segments[0].content, "partial");
        assert!(segments[0].is_truncated());
    }

    #[test]
    fn test_truncated_tool_call_has_no_invocation() {
        let mut parser = parser();
        parser.feed("<tool name=\"ls\">{\"dir\":").unwrap();
        let events = parser.finalize().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            SegmentEvent::End { metadata, .. } if metadata.get(META_TRUNCATED).is_some()
        )));
        assert!(parser.all_invocations().is_empty());
    }

    #[test]
    fn test_buffer_is_compacted() {
        let mut parser = parser();
        parser.feed("some text <write_file path=\"x\">body").unwrap();
        assert!(parser.ctx.buffer().is_empty());
        parser.feed("</write").unwrap();
        assert_eq!(parser.ctx.buffer(), "</write");
    }

    #[test]
    fn test_shared_registry() {
        let first = parser();
        let second = StreamingParser::with_registry(Arc::clone(first.registry()));
        assert!(Arc::ptr_eq(first.registry(), second.registry()));
    }
}
