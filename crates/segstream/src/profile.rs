//! JSON tool-call profiles.
//!
//! Models emit raw JSON tool calls in several vendor shapes. A
//! [`JsonProfile`] recognizes the opening of its shape while text is still
//! streaming in, and normalizes a complete JSON blob into [`ToolCallData`].
//! Anything that does not parse yields no calls; the engine then treats the
//! blob as plain text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use segstream_config::JsonProfileName;

/// A tool call normalized from any supported wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    /// Tool name.
    pub name: String,
    /// Arguments object.
    pub arguments: serde_json::Map<String, Value>,
    /// Invocation id, when the wire shape carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolCallData {
    /// Create a call without an id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    /// Attach an invocation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// JSON form, as carried in END metadata.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("arguments".to_string(), Value::Object(self.arguments.clone()));
        if let Some(id) = &self.id {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        Value::Object(map)
    }
}

/// Outcome of checking streamed text against a profile's opening shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMatch {
    /// The text opens a candidate tool call.
    Yes,
    /// The text cannot open a tool call.
    No,
    /// More input is needed to decide.
    Undecided,
}

/// Vendor wire shape for raw JSON tool calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JsonProfile {
    /// `{"tool": {"function": "name", "parameters": {...}}}`
    #[default]
    Default,
    /// `[{"name": "a", "args": {...}}, {"name": "b", "args": {...}}]`
    Gemini,
    /// `{"tool_calls": [{"id": "...", "function": {"name": "...", "arguments": "..."}}]}`
    OpenAi,
}

const DEFAULT_TRIGGERS: &[&[&str]] = &[&["{", "\"tool\""]];

const GEMINI_TRIGGERS: &[&[&str]] = &[&["[", "{", "\"name\""], &["{", "\"name\""]];

const OPENAI_TRIGGERS: &[&[&str]] = &[
    &["{", "\"tool_calls\""],
    &["{", "\"name\""],
    &["{", "\"id\""],
    &["{", "\"type\""],
    &["[", "{", "\"name\""],
    &["[", "{", "\"id\""],
    &["[", "{", "\"type\""],
];

impl JsonProfile {
    /// Token sequences that may open a tool call in this shape.
    ///
    /// Whitespace is allowed between tokens, never inside them.
    pub fn triggers(&self) -> &'static [&'static [&'static str]] {
        match self {
            JsonProfile::Default => DEFAULT_TRIGGERS,
            JsonProfile::Gemini => GEMINI_TRIGGERS,
            JsonProfile::OpenAi => OPENAI_TRIGGERS,
        }
    }

    /// Byte length of the longest trigger written without whitespace.
    pub fn longest_trigger_len(&self) -> usize {
        self.triggers()
            .iter()
            .map(|tokens| tokens.iter().map(|t| t.len()).sum::<usize>())
            .max()
            .unwrap_or(0)
    }

    /// Characters that can begin a tool call in this shape.
    pub fn openers(&self) -> &'static [char] {
        match self {
            JsonProfile::Default => &['{'],
            JsonProfile::Gemini | JsonProfile::OpenAi => &['{', '['],
        }
    }

    /// Check whether `text` (starting at an opener) begins a tool call.
    pub fn match_trigger(&self, text: &str) -> TriggerMatch {
        let mut undecided = false;
        for tokens in self.triggers() {
            match match_tokens(text, tokens) {
                TriggerMatch::Yes => return TriggerMatch::Yes,
                TriggerMatch::Undecided => undecided = true,
                TriggerMatch::No => {}
            }
        }
        if undecided {
            TriggerMatch::Undecided
        } else {
            TriggerMatch::No
        }
    }

    /// Normalize a complete JSON blob into tool calls.
    ///
    /// Invalid JSON or an unrecognized shape yields an empty list.
    pub fn parse(&self, raw: &str) -> Vec<ToolCallData> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(profile = ?self, error = %e, "JSON tool call did not parse");
                return Vec::new();
            }
        };

        match self {
            JsonProfile::Default => each_object(&value, parse_default_call),
            JsonProfile::Gemini => each_object(&value, parse_gemini_call),
            JsonProfile::OpenAi => match value.get("tool_calls").and_then(Value::as_array) {
                Some(calls) => calls
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(parse_openai_call)
                    .collect(),
                None => each_object(&value, parse_openai_call),
            },
        }
    }
}

impl From<JsonProfileName> for JsonProfile {
    fn from(name: JsonProfileName) -> Self {
        match name {
            JsonProfileName::Default => JsonProfile::Default,
            JsonProfileName::Gemini => JsonProfile::Gemini,
            JsonProfileName::Openai => JsonProfile::OpenAi,
        }
    }
}

/// Coerce an arguments field into an object.
///
/// Objects pass through; strings are parsed as JSON and kept when they hold
/// an object. Everything else becomes an empty object.
pub fn coerce_arguments(value: Option<&Value>) -> serde_json::Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        },
        _ => serde_json::Map::new(),
    }
}

fn match_tokens(text: &str, tokens: &[&str]) -> TriggerMatch {
    let mut rest = text;
    for (i, &token) in tokens.iter().enumerate() {
        if i > 0 {
            rest = rest.trim_start();
        }
        if rest.is_empty() {
            return TriggerMatch::Undecided;
        }
        if let Some(after) = rest.strip_prefix(token) {
            rest = after;
        } else if token.starts_with(rest) {
            return TriggerMatch::Undecided;
        } else {
            return TriggerMatch::No;
        }
    }
    TriggerMatch::Yes
}

fn each_object(
    value: &Value,
    parse: fn(&serde_json::Map<String, Value>) -> Option<ToolCallData>,
) -> Vec<ToolCallData> {
    match value {
        Value::Object(map) => parse(map).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(parse)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_default_call(map: &serde_json::Map<String, Value>) -> Option<ToolCallData> {
    let tool = map.get("tool")?.as_object()?;
    let name = non_empty_str(tool.get("function"))?;
    Some(ToolCallData::new(name, coerce_arguments(tool.get("parameters"))))
}

fn parse_gemini_call(map: &serde_json::Map<String, Value>) -> Option<ToolCallData> {
    let name = non_empty_str(map.get("name"))?;
    Some(ToolCallData::new(name, coerce_arguments(map.get("args"))))
}

fn parse_openai_call(map: &serde_json::Map<String, Value>) -> Option<ToolCallData> {
    let function = map.get("function").and_then(Value::as_object).unwrap_or(map);
    let name = non_empty_str(function.get("name"))?;
    Some(ToolCallData {
        name,
        arguments: coerce_arguments(function.get("arguments")),
        id: non_empty_str(map.get("id")),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
