//! Tool invocations derived from completed tool-call segments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::segment::{META_TOOL_CALLS, META_TOOL_ID, META_TOOL_NAME, META_TRUNCATED, SegmentEvent, SegmentKind};

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of the conversation turn a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Create a new random turn ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocation
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call ready to hand to an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call ID, from the stream when it carried one.
    pub id: String,
    /// Name of the tool being called.
    pub name: String,
    /// Arguments object.
    pub arguments: serde_json::Value,
    /// Turn the call was made in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<TurnId>,
}

/// Generate an ID for a call that arrived without one.
pub fn generate_invocation_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Converts tool-call END events into [`ToolInvocation`]s.
#[derive(Debug, Clone, Default)]
pub struct InvocationAdapter {
    turn_id: Option<TurnId>,
}

impl InvocationAdapter {
    /// Create an adapter with no turn attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every invocation with `turn_id`.
    pub fn with_turn(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    /// Replace or clear the turn attached to later invocations.
    pub fn set_turn_id(&mut self, turn_id: Option<TurnId>) {
        self.turn_id = turn_id;
    }

    /// Invocations produced by `event`.
    ///
    /// Only a tool-call END yields anything; a truncated one yields nothing.
    pub fn adapt(&self, event: &SegmentEvent) -> Vec<ToolInvocation> {
        let SegmentEvent::End {
            segment_id,
            kind: SegmentKind::ToolCall,
            metadata,
        } = event
        else {
            return Vec::new();
        };

        if metadata.get(META_TRUNCATED).and_then(|v| v.as_bool()) == Some(true) {
            tracing::debug!(%segment_id, "skipping truncated tool call");
            return Vec::new();
        }

        let calls = match metadata.get(META_TOOL_CALLS).and_then(|v| v.as_array()) {
            Some(calls) => calls.clone(),
            // Bare END carrying only a name.
            None => match metadata.get(META_TOOL_NAME) {
                Some(name) => {
                    let mut call = serde_json::Map::new();
                    call.insert("name".to_string(), name.clone());
                    if let Some(id) = metadata.get(META_TOOL_ID) {
                        call.insert("id".to_string(), id.clone());
                    }
                    vec![serde_json::Value::Object(call)]
                }
                None => Vec::new(),
            },
        };

        calls
            .iter()
            .filter_map(|call| {
                let name = call.get("name")?.as_str()?.to_string();
                let id = call
                    .get("id")
                    .and_then(|v| v.as_str())
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(generate_invocation_id);
                let arguments = match call.get("arguments") {
                    Some(args @ serde_json::Value::Object(_)) => args.clone(),
                    _ => serde_json::Value::Object(serde_json::Map::new()),
                };
                tracing::debug!(%segment_id, tool = %name, call_id = %id, "tool invocation");
                Some(ToolInvocation {
                    id,
                    name,
                    arguments,
                    turn_id: self.turn_id,
                })
            })
            .collect()
    }
}
