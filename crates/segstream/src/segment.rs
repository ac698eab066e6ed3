//! Segment and event model.
//!
//! The engine reports everything it classifies as a flat list of
//! [`SegmentEvent`]s. Every segment produces exactly one `Start`, zero or
//! more `Content` deltas and exactly one `End`, and at most one segment is
//! open at a time.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SegmentError;

/// Kind-specific key/value data attached to a segment.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key carrying the tool name of a tool-call segment.
pub const META_TOOL_NAME: &str = "tool_name";
/// Metadata key carrying a grammar-supplied invocation id.
pub const META_TOOL_ID: &str = "tool_id";
/// Metadata key carrying the file path of a write/patch segment.
pub const META_PATH: &str = "path";
/// END metadata key carrying the resolved tool calls.
pub const META_TOOL_CALLS: &str = "tool_calls";
/// END metadata key set when `finalize()` force-closed the segment.
pub const META_TRUNCATED: &str = "truncated";

// ─────────────────────────────────────────────────────────────────────────────
// Segment Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Plain narration outside any structured marker.
    Text,
    /// A tool invocation.
    ToolCall,
    /// Full contents of a file to write.
    WriteFile,
    /// A patch to apply to a file.
    PatchFile,
}

impl SegmentKind {
    /// Snake-case name, as used in configuration and serialized events.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Text => "text",
            SegmentKind::ToolCall => "tool_call",
            SegmentKind::WriteFile => "write_file",
            SegmentKind::PatchFile => "patch_file",
        }
    }

    /// Whether this kind is produced by a marker rather than by default.
    pub fn is_structured(&self) -> bool {
        !matches!(self, SegmentKind::Text)
    }
}

impl FromStr for SegmentKind {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(SegmentKind::Text),
            "tool_call" => Ok(SegmentKind::ToolCall),
            "write_file" => Ok(SegmentKind::WriteFile),
            "patch_file" => Ok(SegmentKind::PatchFile),
            other => Err(SegmentError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment Event
// ─────────────────────────────────────────────────────────────────────────────

/// A lifecycle event for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentEvent {
    /// A segment was opened.
    Start {
        /// Stream-unique segment id.
        segment_id: String,
        /// Segment classification.
        kind: SegmentKind,
        /// Metadata known when the segment opened.
        metadata: Metadata,
    },
    /// Content was appended to the open segment.
    Content {
        /// Segment the delta belongs to.
        segment_id: String,
        /// The appended text.
        delta: String,
    },
    /// The segment was closed.
    End {
        /// Segment being closed.
        segment_id: String,
        /// Segment classification.
        kind: SegmentKind,
        /// Metadata resolved at close (tool calls, truncation flag).
        metadata: Metadata,
    },
}

impl SegmentEvent {
    /// Id of the segment this event belongs to.
    pub fn segment_id(&self) -> &str {
        match self {
            SegmentEvent::Start { segment_id, .. }
            | SegmentEvent::Content { segment_id, .. }
            | SegmentEvent::End { segment_id, .. } => segment_id,
        }
    }

    /// Check if this is a start event.
    pub fn is_start(&self) -> bool {
        matches!(self, SegmentEvent::Start { .. })
    }

    /// Check if this is an end event.
    pub fn is_end(&self) -> bool {
        matches!(self, SegmentEvent::End { .. })
    }

    /// The content delta, if this is a content event.
    pub fn delta(&self) -> Option<&str> {
        match self {
            SegmentEvent::Content { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Assembled Segment
// ─────────────────────────────────────────────────────────────────────────────

/// A segment rebuilt from its events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stream-unique segment id.
    pub id: String,
    /// Segment classification.
    pub kind: SegmentKind,
    /// Start metadata overlaid with end metadata.
    pub metadata: Metadata,
    /// Concatenated content deltas.
    pub content: String,
    /// Whether an END event has been seen.
    pub closed: bool,
}

impl Segment {
    /// Whether the segment was force-closed at end of stream.
    pub fn is_truncated(&self) -> bool {
        self.metadata
            .get(META_TRUNCATED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Fold a sequence of events into the segments they describe.
///
/// Events for unknown segment ids (a `Content` without its `Start`) are
/// ignored.
pub fn assemble_segments<'a>(events: impl IntoIterator<Item = &'a SegmentEvent>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for event in events {
        match event {
            SegmentEvent::Start {
                segment_id,
                kind,
                metadata,
            } => segments.push(Segment {
                id: segment_id.clone(),
                kind: *kind,
                metadata: metadata.clone(),
                content: String::new(),
                closed: false,
            }),
            SegmentEvent::Content { segment_id, delta } => {
                if let Some(segment) = segments.iter_mut().rev().find(|s| &s.id == segment_id) {
                    segment.content.push_str(delta);
                }
            }
            SegmentEvent::End {
                segment_id,
                metadata,
                ..
            } => {
                if let Some(segment) = segments.iter_mut().rev().find(|s| &s.id == segment_id) {
                    for (key, value) in metadata {
                        segment.metadata.insert(key.clone(), value.clone());
                    }
                    segment.closed = true;
                }
            }
        }
    }

    segments
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("tool_call".parse::<SegmentKind>().unwrap(), SegmentKind::ToolCall);
        assert_eq!(" write_file ".parse::<SegmentKind>().unwrap(), SegmentKind::WriteFile);
        assert!(matches!(
            "shell".parse::<SegmentKind>(),
            Err(SegmentError::UnknownKind(k)) if k == "shell"
        ));
    }

    #[test]
    fn test_kind_structured() {
        assert!(!SegmentKind::Text.is_structured());
        assert!(SegmentKind::PatchFile.is_structured());
    }

    #[test]
    fn test_event_serialization() {
        let event = SegmentEvent::Content {
            segment_id: "seg_1".to_string(),
            delta: "hello".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "content", "segment_id": "seg_1", "delta": "hello"}));

        let restored: SegmentEvent = serde_json::from_value(value).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_assemble_segments_merges_metadata() {
        let mut start_meta = Metadata::new();
        start_meta.insert(META_PATH.to_string(), json!("a.txt"));
        let mut end_meta = Metadata::new();
        end_meta.insert(META_TRUNCATED.to_string(), json!(true));

        let events = vec![
            SegmentEvent::Start {
                segment_id: "seg_1".to_string(),
                kind: SegmentKind::WriteFile,
                metadata: start_meta,
            },
            SegmentEvent::Content {
                segment_id: "seg_1".to_string(),
                delta: "ab".to_string(),
            },
            SegmentEvent::Content {
                segment_id: "seg_1".to_string(),
                delta: "c".to_string(),
            },
            SegmentEvent::End {
                segment_id: "seg_1".to_string(),
                kind: SegmentKind::WriteFile,
                metadata: end_meta,
            },
        ];

        let segments = assemble_segments(&events);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].content, "abc");
        assert_eq!(segments[0].metadata[META_PATH], "a.txt");
        assert!(segments[0].is_truncated());
        assert!(segments[0].closed);
    }

    #[test]
    fn test_assemble_ignores_orphan_content() {
        let events = vec![SegmentEvent::Content {
            segment_id: "seg_9".to_string(),
            delta: "lost".to_string(),
        }];
        assert!(assemble_segments(&events).is_empty());
    }
}
