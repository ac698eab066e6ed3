//! Content state for segments closed by a literal delimiter.
//!
//! Content is emitted as soon as it is known not to be part of the closing
//! delimiter. A buffer tail that could still grow into the delimiter is held
//! back until the next fragment settles it.

use serde_json::Value;

use crate::context::ParserContext;
use crate::profile::{JsonProfile, ToolCallData};
use crate::segment::{META_TOOL_CALLS, META_TOOL_ID, META_TOOL_NAME, META_TRUNCATED, Metadata};

use super::xml::parse_tool_arguments;
use super::{ParserState, Step, partial_suffix_len};

/// How the body is interpreted when the segment closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// Opaque content (file bodies, patches).
    Raw,
    /// Body of an XML `<tool>` tag.
    XmlTool,
    /// Body of a tool-call sentinel block.
    SentinelTool(JsonProfile),
}

/// State inside a delimited segment.
#[derive(Debug)]
pub struct Delimited {
    closing: String,
    body: BodyFormat,
    start_metadata: Metadata,
    content: String,
}

impl Delimited {
    /// Create the state for a segment that has already been started.
    pub fn new(closing: impl Into<String>, body: BodyFormat, start_metadata: Metadata) -> Self {
        Self {
            closing: closing.into(),
            body,
            start_metadata,
            content: String::new(),
        }
    }

    pub(super) fn run(mut self, ctx: &mut ParserContext, finishing: bool) -> Step {
        if let Some(pos) = ctx.remaining().find(self.closing.as_str()) {
            let end = ctx.cursor() + pos;
            self.keep(ctx.append_content(end));
            ctx.consume(self.closing.len());
            return self.close(ctx);
        }

        if finishing {
            let end = ctx.buffer().len();
            self.keep(ctx.append_content(end));
            tracing::debug!(closing = %self.closing, "stream ended inside segment");
            let mut metadata = Metadata::new();
            metadata.insert(META_TRUNCATED.to_string(), Value::Bool(true));
            ctx.end_segment(metadata);
            return Step::Continue(ParserState::Idle);
        }

        let held = partial_suffix_len(ctx.remaining(), &self.closing);
        let end = ctx.buffer().len() - held;
        self.keep(ctx.append_content(end));
        Step::Suspend(ParserState::Delimited(self))
    }

    /// End the segment with whatever body has been collected.
    pub(super) fn close(self, ctx: &mut ParserContext) -> Step {
        let metadata = self.end_metadata();
        ctx.end_segment(metadata);
        Step::Continue(ParserState::Idle)
    }

    fn keep(&mut self, emitted: &str) {
        if self.body != BodyFormat::Raw {
            self.content.push_str(emitted);
        }
    }

    fn end_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        let calls = match self.body {
            BodyFormat::Raw => return metadata,
            BodyFormat::XmlTool => self.attribute_call().into_iter().collect(),
            BodyFormat::SentinelTool(profile) => {
                let calls = profile.parse(self.content.trim());
                if calls.is_empty() {
                    self.attribute_call().into_iter().collect()
                } else {
                    calls
                }
            }
        };

        metadata.insert(
            META_TOOL_CALLS.to_string(),
            Value::Array(calls.iter().map(ToolCallData::to_json).collect()),
        );
        metadata
    }

    /// A call named by start metadata, with arguments taken from the body.
    fn attribute_call(&self) -> Option<ToolCallData> {
        let name = self.start_metadata.get(META_TOOL_NAME)?.as_str()?;
        let mut call = ToolCallData::new(name, parse_tool_arguments(&self.content));
        if let Some(id) = self.start_metadata.get(META_TOOL_ID).and_then(Value::as_str) {
            call = call.with_id(id);
        }
        Some(call)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
