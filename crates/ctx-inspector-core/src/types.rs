//! Domain records produced by the validator.
//!
//! These are the checked counterparts of the backend's JSON responses. They
//! are built only by [`crate::parse`], so every instance already satisfies the
//! required-field rules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::{AgentId, SessionId};

// =============================================================================
// Sessions and Agents
// =============================================================================

/// Backend conversation context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID.
    pub session_id: SessionId,
    /// Creation time, absent if the backend omitted it or sent garbage.
    pub created_at: Option<DateTime<Utc>>,
    /// Agents in backend order.
    pub agents: Vec<Agent>,
    /// Agent count as reported by the backend.
    pub agent_count: usize,
}

impl Session {
    /// Look up an agent by ID.
    #[must_use]
    pub fn agent(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| &agent.agent_id == agent_id)
    }
}

/// Addressable actor inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Agent ID.
    pub agent_id: AgentId,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional role.
    pub role: Option<String>,
}

impl Agent {
    /// Name for display, falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.agent_id.as_str())
    }
}

// =============================================================================
// Windows and Actions
// =============================================================================

/// A window in the agent's context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Window ID.
    pub id: String,
    /// Optional description.
    pub description: Option<String>,
    /// Window content as text.
    pub content: Option<String>,
    /// Owning app.
    pub app_name: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Actions the window exposes.
    pub actions: Vec<WindowAction>,
}

/// An action that can be invoked on a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAction {
    /// Action ID.
    pub id: String,
    /// Optional label.
    pub label: Option<String>,
    /// Parameter schema, normalised across protocol revisions.
    pub params: Option<ParamSchema>,
}

/// Value kind of a parameter schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Any number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// JSON null.
    Null,
    /// Object with named properties.
    Object,
    /// Array of `items`.
    Array,
    /// Anything the decoder did not recognise.
    Unknown,
}

impl ParamKind {
    /// Decode the numeric protocol code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::String,
            1 => Self::Integer,
            2 => Self::Number,
            3 => Self::Boolean,
            4 => Self::Null,
            5 => Self::Object,
            6 => Self::Array,
            _ => Self::Unknown,
        }
    }

    /// Decode a kind name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" | "int" => Self::Integer,
            "number" | "float" | "double" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "null" => Self::Null,
            "object" => Self::Object,
            "array" => Self::Array,
            _ => Self::Unknown,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Object => "object",
            Self::Array => "array",
            Self::Unknown => "unknown",
        }
    }
}

/// One node of an action parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    /// Value kind.
    pub kind: ParamKind,
    /// Optional description.
    pub description: Option<String>,
    /// Whether the parameter must be supplied. Defaults to `true`.
    pub required: bool,
    /// Named children, in backend order.
    pub properties: Vec<ParamProperty>,
    /// Element schema for arrays.
    pub items: Option<Box<ParamSchema>>,
}

impl ParamSchema {
    /// A required object schema with the given properties.
    #[must_use]
    pub fn object(properties: Vec<ParamProperty>) -> Self {
        Self {
            kind: ParamKind::Object,
            description: None,
            required: true,
            properties,
            items: None,
        }
    }

    /// Look up a direct child by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&ParamSchema> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.schema)
    }
}

/// A named child of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamProperty {
    /// Property name.
    pub name: String,
    /// Property schema.
    pub schema: ParamSchema,
}

/// An app registered in the agent's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    /// App name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Number of windows the app currently owns.
    pub window_count: i64,
}

// =============================================================================
// Timeline
// =============================================================================

/// One entry of a session+agent timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    /// Item ID.
    pub id: String,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Sequence number, unique within the timeline.
    pub seq: i64,
    /// Whether the backend marked the item obsolete.
    pub is_obsolete: bool,
    /// Raw text content.
    pub raw_content: String,
    /// Estimated token count.
    pub estimated_tokens: i64,
}

// =============================================================================
// Interaction Results
// =============================================================================

/// Terminal outcome of an `interact` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResult {
    /// Whether the backend handled the message.
    pub success: bool,
    /// Failure description.
    pub error: Option<String>,
    /// Free-text reply.
    pub response: Option<String>,
    /// Action the agent chose.
    pub action: Option<ActionTaken>,
    /// Outcome of that action.
    pub action_result: Option<ActionOutcome>,
    /// Individual tool steps.
    pub steps: Vec<InteractionStep>,
    /// Token counters.
    pub usage: Option<TokenUsage>,
}

/// Action selected by the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTaken {
    /// Target window.
    pub window_id: Option<String>,
    /// Action ID.
    pub action_id: Option<String>,
    /// Arguments as sent.
    pub params: Option<serde_json::Value>,
}

/// Result of the selected action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    /// Whether the action succeeded.
    pub success: bool,
    /// Message text.
    pub message: Option<String>,
    /// Summary text.
    pub summary: Option<String>,
    /// Background task, if the action started one.
    pub task_id: Option<String>,
}

/// One tool call made during the interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionStep {
    /// Call ID.
    pub call_id: String,
    /// Target window.
    pub window_id: String,
    /// Action ID.
    pub action_id: String,
    /// Mode the backend resolved the call to.
    pub resolved_mode: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Message text.
    pub message: Option<String>,
    /// Summary text.
    pub summary: Option<String>,
    /// Background task ID.
    pub task_id: Option<String>,
    /// Turn number.
    pub turn: i64,
    /// Position within the turn.
    pub index: i64,
}

/// Token counters reported for an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens.
    pub prompt_tokens: i64,
    /// Completion tokens.
    pub completion_tokens: i64,
    /// Total tokens.
    pub total_tokens: i64,
}

/// Outcome of invoking an action or a simulation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// Whether the backend accepted the call.
    pub success: bool,
    /// Failure description.
    pub error: Option<String>,
    /// Message text.
    pub message: Option<String>,
    /// Summary text.
    pub summary: Option<String>,
    /// Background task ID.
    pub task_id: Option<String>,
    /// Mode the backend resolved the call to.
    pub resolved_mode: Option<String>,
    /// Raw result payload.
    pub result: Option<serde_json::Value>,
}
