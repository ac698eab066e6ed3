//! Shared parsing context: the buffer, the cursor and the event sink.
//!
//! Exactly one state owns the context at a time. States read the unconsumed
//! tail through [`ParserContext::remaining`] and move the cursor only by
//! emitting (text or content) or by consuming delimiter text.

use crate::segment::{Metadata, SegmentEvent, SegmentKind};

#[derive(Debug, Clone)]
struct OpenSegment {
    id: String,
    kind: SegmentKind,
}

/// Buffer, cursor and pending events for one stream.
#[derive(Debug, Default)]
pub struct ParserContext {
    buffer: String,
    cursor: usize,
    next_segment: u64,
    text: Option<OpenSegment>,
    active: Option<OpenSegment>,
    events: Vec<SegmentEvent>,
}

impl ParserContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the buffer.
    pub fn append(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    /// The retained buffer.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current scan position within [`buffer`](Self::buffer).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unconsumed text from the cursor to the end of the buffer.
    pub fn remaining(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    /// Skip `len` bytes without emitting them (delimiter text).
    pub fn consume(&mut self, len: usize) {
        let end = self.cursor + len;
        debug_assert!(self.buffer.is_char_boundary(end));
        self.cursor = end;
    }

    /// Flush text from the cursor up to absolute offset `end` as TEXT.
    ///
    /// Opens a text segment on the first non-empty flush.
    pub fn emit_text(&mut self, end: usize) {
        debug_assert!(self.active.is_none(), "text emitted inside a structured segment");
        if end <= self.cursor {
            return;
        }
        let delta = self.buffer[self.cursor..end].to_string();
        self.cursor = end;

        let id = match &self.text {
            Some(open) => open.id.clone(),
            None => {
                let id = self.next_id();
                self.events.push(SegmentEvent::Start {
                    segment_id: id.clone(),
                    kind: SegmentKind::Text,
                    metadata: Metadata::new(),
                });
                self.text = Some(OpenSegment {
                    id: id.clone(),
                    kind: SegmentKind::Text,
                });
                id
            }
        };
        self.events.push(SegmentEvent::Content {
            segment_id: id,
            delta,
        });
    }

    /// Close the open text segment, if any.
    pub fn close_text(&mut self) {
        if let Some(open) = self.text.take() {
            self.events.push(SegmentEvent::End {
                segment_id: open.id,
                kind: open.kind,
                metadata: Metadata::new(),
            });
        }
    }

    /// Open a structured segment, closing any open text segment first.
    pub fn start_segment(&mut self, kind: SegmentKind, metadata: Metadata) {
        debug_assert!(self.active.is_none(), "segment started while another is open");
        self.close_text();
        let id = self.next_id();
        tracing::debug!(segment_id = %id, kind = %kind, "segment started");
        self.events.push(SegmentEvent::Start {
            segment_id: id.clone(),
            kind,
            metadata,
        });
        self.active = Some(OpenSegment { id, kind });
    }

    /// Emit text from the cursor up to absolute offset `end` as content of
    /// the open structured segment, returning the emitted slice.
    pub fn append_content(&mut self, end: usize) -> &str {
        let start = self.cursor;
        if end <= start {
            return "";
        }
        self.cursor = end;
        if let Some(open) = &self.active {
            self.events.push(SegmentEvent::Content {
                segment_id: open.id.clone(),
                delta: self.buffer[start..end].to_string(),
            });
        }
        &self.buffer[start..end]
    }

    /// Close the open structured segment.
    pub fn end_segment(&mut self, metadata: Metadata) {
        if let Some(open) = self.active.take() {
            tracing::debug!(segment_id = %open.id, kind = %open.kind, "segment ended");
            self.events.push(SegmentEvent::End {
                segment_id: open.id,
                kind: open.kind,
                metadata,
            });
        }
    }

    /// Take the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<SegmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop the consumed prefix of the buffer.
    ///
    /// States that still need lookback keep the cursor parked at the start
    /// of their marker, so everything before the cursor is safe to discard.
    pub fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Return to the freshly constructed state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn next_id(&mut self) -> String {
        self.next_segment += 1;
        format!("seg_{}", self.next_segment)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
