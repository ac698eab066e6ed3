//! Sentinel initialization.
//!
//! Sentinel literals are out-of-band tokens, so a complete start literal is
//! always a valid opening. Kind and metadata come from the registration,
//! not from the stream.

use crate::config::SentinelSpec;
use crate::context::ParserContext;
use crate::profile::JsonProfile;
use crate::segment::SegmentKind;

use super::delimited::{BodyFormat, Delimited};
use super::{ParserState, Step};

/// State entered on a sentinel start literal.
#[derive(Debug)]
pub struct SentinelInit {
    spec: SentinelSpec,
    profile: JsonProfile,
}

impl SentinelInit {
    /// Create the state for a matched sentinel.
    pub fn new(spec: SentinelSpec, profile: JsonProfile) -> Self {
        Self { spec, profile }
    }

    pub(super) fn run(self, ctx: &mut ParserContext) -> Step {
        debug_assert!(ctx.remaining().starts_with(self.spec.start.as_str()));
        ctx.consume(self.spec.start.len());

        let body = match self.spec.kind {
            SegmentKind::ToolCall => BodyFormat::SentinelTool(self.profile),
            _ => BodyFormat::Raw,
        };
        let metadata = self.spec.metadata;
        ctx.start_segment(self.spec.kind, metadata.clone());

        Step::Continue(ParserState::Delimited(Delimited::new(
            self.spec.end,
            body,
            metadata,
        )))
    }
}
