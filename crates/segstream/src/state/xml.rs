//! XML-style tag grammar.
//!
//! Recognized openings:
//!
//! ```text
//! <tool name="search" id="call_1">...</tool>
//! <write_file path="src/main.rs">...</write_file>
//! <patch_file path="src/main.rs">...</patch_file>
//! ```
//!
//! An opening tag without its required attribute is not a segment; its `<`
//! is handed back as text.

use serde_json::Value;

use crate::context::ParserContext;
use crate::segment::{META_PATH, META_TOOL_ID, META_TOOL_NAME, Metadata, SegmentKind};

use super::delimited::{BodyFormat, Delimited};
use super::{ParserState, Step, reject_marker, window};

const GRAMMAR: &str = "xml_tag";

/// A recognized XML-style tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmlTag {
    /// `<tool name="...">`
    Tool,
    /// `<write_file path="...">`
    WriteFile,
    /// `<patch_file path="...">`
    PatchFile,
}

impl XmlTag {
    /// Every recognized tag.
    pub const ALL: [XmlTag; 3] = [XmlTag::Tool, XmlTag::WriteFile, XmlTag::PatchFile];

    /// Opening marker text (without attributes).
    pub fn opening(&self) -> &'static str {
        match self {
            XmlTag::Tool => "<tool",
            XmlTag::WriteFile => "<write_file",
            XmlTag::PatchFile => "<patch_file",
        }
    }

    /// Closing delimiter.
    pub fn closing(&self) -> &'static str {
        match self {
            XmlTag::Tool => "</tool>",
            XmlTag::WriteFile => "</write_file>",
            XmlTag::PatchFile => "</patch_file>",
        }
    }

    /// Segment kind produced.
    pub fn kind(&self) -> SegmentKind {
        match self {
            XmlTag::Tool => SegmentKind::ToolCall,
            XmlTag::WriteFile => SegmentKind::WriteFile,
            XmlTag::PatchFile => SegmentKind::PatchFile,
        }
    }

    /// Attribute that must be present and non-empty.
    pub fn required_attribute(&self) -> &'static str {
        match self {
            XmlTag::Tool => "name",
            XmlTag::WriteFile | XmlTag::PatchFile => "path",
        }
    }

    /// Byte length of the shortest opening tag that validates, such as
    /// `<tool name=x>`.
    pub fn shortest_opening_len(&self) -> usize {
        self.opening().len() + " ".len() + self.required_attribute().len() + "=x>".len()
    }
}

/// State validating an XML-style opening tag.
///
/// The cursor stays on the `<` until the tag is accepted or rejected.
#[derive(Debug)]
pub struct XmlTagInit {
    tag: XmlTag,
    max_marker_len: usize,
}

impl XmlTagInit {
    /// Create the state for a located opening marker.
    pub fn new(tag: XmlTag, max_marker_len: usize) -> Self {
        Self {
            tag,
            max_marker_len,
        }
    }

    pub(super) fn run(self, ctx: &mut ParserContext, finishing: bool) -> Step {
        let rest = ctx.remaining();
        let name_len = self.tag.opening().len();

        let after_name = rest[name_len..].chars().next();
        match after_name {
            None => return self.wait(ctx, finishing),
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => {}
            Some(_) => return reject_marker(ctx, GRAMMAR, "tag name continues"),
        }

        let Some(gt) = find_tag_end(window(rest, self.max_marker_len), name_len) else {
            if rest.len() >= self.max_marker_len {
                return reject_marker(ctx, GRAMMAR, "opening tag too long");
            }
            return self.wait(ctx, finishing);
        };

        let mut attrs_src = &rest[name_len..gt];
        let self_closing = attrs_src.trim_end().ends_with('/');
        if self_closing {
            attrs_src = attrs_src.trim_end().trim_end_matches('/');
        }

        let Some(attributes) = parse_attributes(attrs_src) else {
            return reject_marker(ctx, GRAMMAR, "malformed attributes");
        };
        let required = self.tag.required_attribute();
        let Some(value) = attribute(&attributes, required).filter(|v| !v.trim().is_empty()) else {
            return reject_marker(ctx, GRAMMAR, "missing required attribute");
        };

        let mut metadata = Metadata::new();
        match self.tag {
            XmlTag::Tool => {
                metadata.insert(META_TOOL_NAME.to_string(), Value::String(value.trim().to_string()));
                if let Some(id) = attribute(&attributes, "id").filter(|v| !v.is_empty()) {
                    metadata.insert(META_TOOL_ID.to_string(), Value::String(id.to_string()));
                }
            }
            XmlTag::WriteFile | XmlTag::PatchFile => {
                metadata.insert(META_PATH.to_string(), Value::String(value.to_string()));
            }
        }

        ctx.consume(gt + 1);
        ctx.start_segment(self.tag.kind(), metadata.clone());

        let body = match self.tag {
            XmlTag::Tool => BodyFormat::XmlTool,
            _ => BodyFormat::Raw,
        };
        let content = Delimited::new(self.tag.closing(), body, metadata);
        if self_closing {
            return content.close(ctx);
        }
        Step::Continue(ParserState::Delimited(content))
    }

    fn wait(self, ctx: &mut ParserContext, finishing: bool) -> Step {
        if finishing {
            return reject_marker(ctx, GRAMMAR, "stream ended inside opening tag");
        }
        tracing::trace!(tag = self.tag.opening(), "waiting for end of opening tag");
        Step::Suspend(ParserState::XmlTagInit(self))
    }
}

/// Offset of the `>` closing an opening tag, skipping quoted values.
fn find_tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.get(from..)?.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

/// Parse `key="value" key='value' key=value` pairs.
///
/// Returns `None` on anything that is not an attribute list.
fn parse_attributes(src: &str) -> Option<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    let mut rest = src.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
        {
            return None;
        }
        rest = rest[name_end..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            // Bare attribute.
            attributes.push((name.to_string(), String::new()));
            continue;
        };
        rest = after_eq.trim_start();

        let value;
        match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let close = rest[1..].find(q)?;
                value = unescape(&rest[1..1 + close]);
                rest = &rest[close + 2..];
            }
            Some(_) => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                value = unescape(&rest[..end]);
                rest = &rest[end..];
            }
            None => return None,
        }

        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        attributes.push((name.to_string(), value));
        rest = rest.trim_start();
    }

    Some(attributes)
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Decode the five predefined XML entities.
fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Resolve the arguments of a `<tool>` body.
///
/// In order of preference: `<arg name="k">v</arg>` children (an
/// `<arguments>` wrapper is ignored), a JSON object body, the trimmed body
/// as `{"input": ...}`, or an empty object.
pub fn parse_tool_arguments(body: &str) -> serde_json::Map<String, Value> {
    let mut arguments = serde_json::Map::new();
    let mut rest = body;

    while let Some(open) = find_arg_open(rest) {
        let after_name = &rest[open + "<arg".len()..];
        let Some(gt) = find_tag_end(after_name, 0) else {
            break;
        };
        let Some(close) = after_name[gt + 1..].find("</arg>") else {
            break;
        };
        let value = &after_name[gt + 1..gt + 1 + close];
        if let Some(attrs) = parse_attributes(&after_name[..gt])
            && let Some(name) = attribute(&attrs, "name").filter(|n| !n.is_empty())
        {
            arguments.insert(name.to_string(), Value::String(unescape(value.trim())));
        }
        rest = &after_name[gt + 1 + close + "</arg>".len()..];
    }

    if !arguments.is_empty() {
        return arguments;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return arguments;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return map;
    }
    arguments.insert("input".to_string(), Value::String(trimmed.to_string()));
    arguments
}

/// Position of an `<arg` tag (not `<arguments>`).
fn find_arg_open(text: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = text[from..].find("<arg") {
        let at = from + pos;
        match text[at + "<arg".len()..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' => return Some(at),
            _ => from = at + "<arg".len(),
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
