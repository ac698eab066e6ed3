//! Raw JSON tool-call grammar.
//!
//! A `{` or `[` only opens a segment when the text after it matches one of
//! the profile's trigger sequences, the blob is well-formed JSON that closes
//! within `max_json_len` bytes, and the profile extracts at least one call
//! from it. Anything else is text, and a blob is given up at the first byte
//! that cannot continue valid JSON.

use serde_json::Value;

use crate::context::ParserContext;
use crate::profile::{JsonProfile, ToolCallData, TriggerMatch};
use crate::segment::{META_TOOL_CALLS, META_TOOL_ID, META_TOOL_NAME, Metadata, SegmentKind};

use super::{ParserState, Step, reject_marker, window};

const GRAMMAR: &str = "json_tool_call";

/// Outcome of scanning the text after a JSON opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// The value closed after this many bytes.
    Complete(usize),
    /// Valid so far; more input is needed.
    Pending,
    /// A byte that cannot continue a JSON value.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Pending,
    Hex(u8),
}

/// What the next byte may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrClose,
    KeyOrClose,
    Key,
    Colon,
    CommaOrClose,
    String { key: bool, escape: Escape },
    Literal(&'static [u8]),
    Number,
}

/// Incremental JSON syntax checker.
///
/// Works on bytes: every structural character is ASCII, and UTF-8
/// continuation bytes never collide with them. Numbers are only checked for
/// their character set; the final parse catches the rest.
#[derive(Debug, Clone)]
struct JsonScanner {
    pos: usize,
    stack: Vec<Container>,
    expect: Expect,
}

impl Default for JsonScanner {
    fn default() -> Self {
        Self {
            pos: 0,
            stack: Vec::new(),
            expect: Expect::Value,
        }
    }
}

impl JsonScanner {
    /// Continue scanning `text` (always the same prefix plus new input),
    /// looking at no more than `limit` bytes.
    fn advance(&mut self, text: &str, limit: usize) -> Scan {
        let bytes = text.as_bytes();
        let end = bytes.len().min(limit);
        while self.pos < end {
            let b = bytes[self.pos];
            if self.expect == Expect::Number {
                if b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E') {
                    self.pos += 1;
                    continue;
                }
                self.expect = Expect::CommaOrClose;
            }
            if !self.accept(b) {
                return Scan::Invalid;
            }
            self.pos += 1;
            if self.stack.is_empty() {
                return Scan::Complete(self.pos);
            }
        }
        if self.pos >= limit {
            Scan::Invalid
        } else {
            Scan::Pending
        }
    }

    fn accept(&mut self, b: u8) -> bool {
        match self.expect {
            Expect::String { key, escape } => return self.accept_string(b, key, escape),
            Expect::Literal(rest) => {
                if rest.first() != Some(&b) {
                    return false;
                }
                self.expect = if rest.len() == 1 {
                    Expect::CommaOrClose
                } else {
                    Expect::Literal(&rest[1..])
                };
                return true;
            }
            _ => {}
        }

        if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
            return !self.stack.is_empty();
        }

        match (self.expect, b) {
            (Expect::ValueOrClose, b']') => self.close(Container::Array),
            (Expect::Value | Expect::ValueOrClose, _) => self.open_value(b),
            (Expect::KeyOrClose, b'}') => self.close(Container::Object),
            (Expect::KeyOrClose | Expect::Key, b'"') => {
                self.expect = Expect::String {
                    key: true,
                    escape: Escape::None,
                };
                true
            }
            (Expect::Colon, b':') => {
                self.expect = Expect::Value;
                true
            }
            (Expect::CommaOrClose, b',') => {
                self.expect = match self.stack.last() {
                    Some(Container::Object) => Expect::Key,
                    _ => Expect::Value,
                };
                true
            }
            (Expect::CommaOrClose, b'}') => self.close(Container::Object),
            (Expect::CommaOrClose, b']') => self.close(Container::Array),
            _ => false,
        }
    }

    fn open_value(&mut self, b: u8) -> bool {
        // The opener is always a container; scalars only appear inside one.
        if self.stack.is_empty() && !matches!(b, b'{' | b'[') {
            return false;
        }
        self.expect = match b {
            b'{' => {
                self.stack.push(Container::Object);
                Expect::KeyOrClose
            }
            b'[' => {
                self.stack.push(Container::Array);
                Expect::ValueOrClose
            }
            b'"' => Expect::String {
                key: false,
                escape: Escape::None,
            },
            b't' => Expect::Literal(b"rue"),
            b'f' => Expect::Literal(b"alse"),
            b'n' => Expect::Literal(b"ull"),
            b'-' | b'0'..=b'9' => Expect::Number,
            _ => return false,
        };
        true
    }

    fn accept_string(&mut self, b: u8, key: bool, escape: Escape) -> bool {
        let escape = match escape {
            Escape::None => match b {
                b'"' => {
                    self.expect = if key {
                        Expect::Colon
                    } else {
                        Expect::CommaOrClose
                    };
                    return true;
                }
                b'\\' => Escape::Pending,
                0x00..=0x1f => return false,
                _ => Escape::None,
            },
            Escape::Pending => match b {
                b'u' => Escape::Hex(0),
                b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Escape::None,
                _ => return false,
            },
            Escape::Hex(n) => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
                if n == 3 { Escape::None } else { Escape::Hex(n + 1) }
            }
        };
        self.expect = Expect::String { key, escape };
        true
    }

    fn close(&mut self, container: Container) -> bool {
        if self.stack.pop() != Some(container) {
            return false;
        }
        self.expect = Expect::CommaOrClose;
        true
    }
}

/// State checking a JSON opener for a tool call.
///
/// The cursor stays on the opener while the blob is scanned, so compaction
/// never invalidates the scanner position.
#[derive(Debug)]
pub struct JsonInit {
    profile: JsonProfile,
    max_marker_len: usize,
    max_json_len: usize,
    triggered: bool,
    scanner: JsonScanner,
}

impl JsonInit {
    /// Create the state for an opener at the cursor.
    pub fn new(profile: JsonProfile, max_marker_len: usize, max_json_len: usize) -> Self {
        Self {
            profile,
            max_marker_len,
            max_json_len,
            triggered: false,
            scanner: JsonScanner::default(),
        }
    }

    pub(super) fn run(mut self, ctx: &mut ParserContext, finishing: bool) -> Step {
        let rest = ctx.remaining();

        if !self.triggered {
            match self.profile.match_trigger(window(rest, self.max_marker_len)) {
                TriggerMatch::Yes => self.triggered = true,
                TriggerMatch::No => return reject_marker(ctx, GRAMMAR, "no trigger"),
                TriggerMatch::Undecided => {
                    if finishing || rest.len() >= self.max_marker_len {
                        return reject_marker(ctx, GRAMMAR, "trigger undecided");
                    }
                    return Step::Suspend(ParserState::JsonInit(self));
                }
            }
        }

        let end = match self.scanner.advance(rest, self.max_json_len) {
            Scan::Complete(end) => end,
            Scan::Invalid => return reject_marker(ctx, GRAMMAR, "not valid JSON"),
            Scan::Pending if finishing => {
                return reject_marker(ctx, GRAMMAR, "unbalanced JSON at end of stream");
            }
            Scan::Pending => return Step::Suspend(ParserState::JsonInit(self)),
        };

        let calls = self.profile.parse(&rest[..end]);
        let Some(first) = calls.first() else {
            return reject_marker(ctx, GRAMMAR, "no tool call in JSON");
        };

        let mut metadata = Metadata::new();
        metadata.insert(META_TOOL_NAME.to_string(), Value::String(first.name.clone()));
        if let Some(id) = &first.id {
            metadata.insert(META_TOOL_ID.to_string(), Value::String(id.clone()));
        }
        tracing::trace!(calls = calls.len(), len = end, "JSON tool call recognized");
        ctx.start_segment(SegmentKind::ToolCall, metadata);

        Step::Continue(ParserState::JsonContent(JsonContent { len: end, calls }))
    }
}

/// A complete, parsed JSON tool call whose text is still to be emitted.
#[derive(Debug)]
pub struct JsonContent {
    len: usize,
    calls: Vec<ToolCallData>,
}

impl JsonContent {
    pub(super) fn run(self, ctx: &mut ParserContext) -> Step {
        ctx.append_content(ctx.cursor() + self.len);

        let mut metadata = Metadata::new();
        metadata.insert(
            META_TOOL_CALLS.to_string(),
            Value::Array(self.calls.iter().map(ToolCallData::to_json).collect()),
        );
        ctx.end_segment(metadata);
        Step::Continue(ParserState::Idle)
    }
}
