//! Parsers for every backend response shape.
//!
//! Each parser takes a decoded JSON value and a path label and returns a
//! checked record from [`crate::types`]. Failures name the exact location of
//! the offending value (for example `windows[1].actions[0].id`).

use serde_json::Value;

use crate::contract::{
    coerce_bool, coerce_date, coerce_number, decode_param_kind, field_path, index_path,
    optional_number, optional_string, optional_text, parse_each, parse_optional_each,
    require_record, require_string, string_or_empty, Record,
};
use crate::error::{InspectorError, Result};
use crate::ids::{AgentId, SessionId};
use crate::types::{
    ActionOutcome, ActionTaken, Agent, AppSummary, InteractionResult, InteractionStep,
    InvocationResult, ParamProperty, ParamSchema, Session, TimelineItem, TokenUsage, Window,
    WindowAction,
};

// =============================================================================
// Sessions
// =============================================================================

/// Parse a session record.
///
/// # Errors
///
/// Returns a contract error if `sessionId` is missing or any agent is malformed.
pub fn parse_session(value: &Value, path: &str) -> Result<Session> {
    let record = require_record(value, path)?;
    let session_id = SessionId::new(require_string(record, "sessionId", path)?)
        .map_err(|err| InspectorError::contract(field_path(path, "sessionId"), err.to_string()))?;
    let agents = parse_optional_each(record, "agents", path, parse_agent)?;
    let agent_count = optional_number(record, "agentCount")
        .map_or(agents.len(), |count| usize::try_from(count).unwrap_or(0));

    Ok(Session {
        session_id,
        created_at: coerce_date(record.get("createdAt")),
        agents,
        agent_count,
    })
}

/// Parse an array of sessions.
///
/// # Errors
///
/// Returns a contract error naming the first malformed element.
pub fn parse_sessions(value: &Value, path: &str) -> Result<Vec<Session>> {
    parse_each(value, path, parse_session)
}

/// Parse an agent record.
///
/// # Errors
///
/// Returns a contract error if `agentId` is missing or blank.
pub fn parse_agent(value: &Value, path: &str) -> Result<Agent> {
    let record = require_record(value, path)?;
    let agent_id = AgentId::new(require_string(record, "agentId", path)?)
        .map_err(|err| InspectorError::contract(field_path(path, "agentId"), err.to_string()))?;

    Ok(Agent {
        agent_id,
        name: optional_string(record, "name"),
        role: optional_string(record, "role"),
    })
}

// =============================================================================
// Windows, Actions and Apps
// =============================================================================

/// Parse a window record.
///
/// # Errors
///
/// Returns a contract error if `id` is missing or an action is malformed.
pub fn parse_window(value: &Value, path: &str) -> Result<Window> {
    let record = require_record(value, path)?;

    Ok(Window {
        id: require_string(record, "id", path)?,
        description: optional_string(record, "description"),
        content: optional_text(record, "content"),
        app_name: optional_string(record, "appName"),
        created_at: coerce_date(record.get("createdAt")),
        updated_at: coerce_date(record.get("updatedAt")),
        actions: parse_optional_each(record, "actions", path, parse_action)?,
    })
}

/// Parse an array of windows.
///
/// # Errors
///
/// Returns a contract error naming the first malformed element.
pub fn parse_windows(value: &Value, path: &str) -> Result<Vec<Window>> {
    parse_each(value, path, parse_window)
}

/// How an action describes its parameters.
///
/// Older backends send a `parameters` list of named nodes; newer ones send a
/// single `paramSchema` object node.
enum ParamsRepr<'a> {
    Schema { value: &'a Value, path: String },
    List { values: &'a [Value], path: String },
    Absent,
}

impl<'a> ParamsRepr<'a> {
    fn read(record: &'a Record, path: &str) -> Self {
        match (record.get("paramSchema"), record.get("parameters")) {
            (Some(value), _) if !value.is_null() => Self::Schema {
                value,
                path: field_path(path, "paramSchema"),
            },
            (_, Some(Value::Array(values))) => Self::List {
                values,
                path: field_path(path, "parameters"),
            },
            (_, Some(value)) if !value.is_null() => Self::Schema {
                value,
                path: field_path(path, "parameters"),
            },
            _ => Self::Absent,
        }
    }

    fn into_schema(self) -> Result<Option<ParamSchema>> {
        match self {
            Self::Schema { value, path } => parse_param_schema(value, &path).map(Some),
            Self::List { values, path } => {
                let properties = values
                    .iter()
                    .enumerate()
                    .map(|(index, element)| parse_named_param(element, &index_path(&path, index)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(ParamSchema::object(properties)))
            }
            Self::Absent => Ok(None),
        }
    }
}

/// Parse a window action.
///
/// # Errors
///
/// Returns a contract error if `id` is missing or the parameter schema is malformed.
pub fn parse_action(value: &Value, path: &str) -> Result<WindowAction> {
    let record = require_record(value, path)?;

    Ok(WindowAction {
        id: require_string(record, "id", path)?,
        label: optional_string(record, "label"),
        params: ParamsRepr::read(record, path).into_schema()?,
    })
}

/// Parse one parameter schema node, recursing into `properties` and `items`.
///
/// `required` defaults to `true` when absent.
///
/// # Errors
///
/// Returns a contract error if the node or any descendant is not an object,
/// or a list-form property has no `name`.
pub fn parse_param_schema(value: &Value, path: &str) -> Result<ParamSchema> {
    let record = require_record(value, path)?;
    let kind = decode_param_kind(record.get("type").or_else(|| record.get("kind")));
    let required = match record.get("required") {
        None | Some(Value::Null) => true,
        flag => coerce_bool(flag),
    };

    let properties = match record.get("properties") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => {
            let base = field_path(path, "properties");
            map.iter()
                .map(|(name, node)| {
                    Ok(ParamProperty {
                        name: name.clone(),
                        schema: parse_param_schema(node, &field_path(&base, name))?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        Some(other) => parse_each(other, &field_path(path, "properties"), parse_named_param)?,
    };

    let items = match record.get("items") {
        None | Some(Value::Null) => None,
        Some(node) => Some(Box::new(parse_param_schema(node, &field_path(path, "items"))?)),
    };

    Ok(ParamSchema {
        kind,
        description: optional_string(record, "description"),
        required,
        properties,
        items,
    })
}

fn parse_named_param(value: &Value, path: &str) -> Result<ParamProperty> {
    let record = require_record(value, path)?;
    Ok(ParamProperty {
        name: require_string(record, "name", path)?,
        schema: parse_param_schema(value, path)?,
    })
}

/// Parse an array of apps. `name` falls back to `appName`.
///
/// # Errors
///
/// Returns a contract error naming the first element with neither field.
pub fn parse_apps(value: &Value, path: &str) -> Result<Vec<AppSummary>> {
    parse_each(value, path, |element, element_path| {
        let record = require_record(element, element_path)?;
        let name = require_string(record, "name", element_path)
            .or_else(|err| require_string(record, "appName", element_path).map_err(|_| err))?;

        Ok(AppSummary {
            name,
            description: optional_string(record, "description"),
            window_count: coerce_number(record.get("windowCount")),
        })
    })
}

// =============================================================================
// Timeline
// =============================================================================

/// Parse a timeline item.
///
/// # Errors
///
/// Returns a contract error if `id`, `type` or `seq` is missing.
pub fn parse_timeline_item(value: &Value, path: &str) -> Result<TimelineItem> {
    let record = require_record(value, path)?;
    let seq = match record.get("seq") {
        None | Some(Value::Null) => {
            return Err(InspectorError::contract(
                field_path(path, "seq"),
                "required field is missing",
            ))
        }
        seq => coerce_number(seq),
    };

    Ok(TimelineItem {
        id: require_string(record, "id", path)?,
        item_type: require_string(record, "type", path)?,
        seq,
        is_obsolete: coerce_bool(record.get("isObsolete")),
        raw_content: string_or_empty(record, "rawContent"),
        estimated_tokens: coerce_number(record.get("estimatedTokens")),
    })
}

/// Parse a timeline array.
///
/// # Errors
///
/// Returns a contract error naming the first malformed element.
pub fn parse_timeline(value: &Value, path: &str) -> Result<Vec<TimelineItem>> {
    parse_each(value, path, parse_timeline_item)
}

// =============================================================================
// Interaction and Invocation Results
// =============================================================================

/// Parse the result of an `interact` request.
///
/// A `success = false` result parses fine; callers decide what a failure means.
///
/// # Errors
///
/// Returns a contract error if the root or a nested record is malformed.
pub fn parse_interaction_result(value: &Value, path: &str) -> Result<InteractionResult> {
    let record = require_record(value, path)?;

    let action = match record.get("action") {
        None | Some(Value::Null) => None,
        Some(action) => {
            let action = require_record(action, &field_path(path, "action"))?;
            Some(ActionTaken {
                window_id: optional_string(action, "windowId"),
                action_id: optional_string(action, "actionId"),
                params: action.get("params").filter(|p| !p.is_null()).cloned(),
            })
        }
    };

    let action_result = match record.get("actionResult") {
        None | Some(Value::Null) => None,
        Some(outcome) => {
            let outcome = require_record(outcome, &field_path(path, "actionResult"))?;
            Some(ActionOutcome {
                success: coerce_bool(outcome.get("success")),
                message: optional_string(outcome, "message"),
                summary: optional_string(outcome, "summary"),
                task_id: optional_string(outcome, "taskId"),
            })
        }
    };

    let usage = match record.get("usage") {
        None | Some(Value::Null) => None,
        Some(usage) => {
            let usage = require_record(usage, &field_path(path, "usage"))?;
            Some(TokenUsage {
                prompt_tokens: coerce_number(usage.get("promptTokens")),
                completion_tokens: coerce_number(usage.get("completionTokens")),
                total_tokens: coerce_number(usage.get("totalTokens")),
            })
        }
    };

    Ok(InteractionResult {
        success: coerce_bool(record.get("success")),
        error: optional_string(record, "error"),
        response: optional_string(record, "response"),
        action,
        action_result,
        steps: parse_optional_each(record, "steps", path, parse_step)?,
        usage,
    })
}

fn parse_step(value: &Value, path: &str) -> Result<InteractionStep> {
    let record = require_record(value, path)?;

    Ok(InteractionStep {
        call_id: require_string(record, "callId", path)?,
        window_id: require_string(record, "windowId", path)?,
        action_id: require_string(record, "actionId", path)?,
        resolved_mode: string_or_empty(record, "resolvedMode"),
        success: coerce_bool(record.get("success")),
        message: optional_string(record, "message"),
        summary: optional_string(record, "summary"),
        task_id: optional_string(record, "taskId"),
        turn: coerce_number(record.get("turn")),
        index: coerce_number(record.get("index")),
    })
}

/// Parse the result of an action invocation or simulation call.
///
/// # Errors
///
/// Returns a contract error if the root is not an object.
pub fn parse_invocation_result(value: &Value, path: &str) -> Result<InvocationResult> {
    let record = require_record(value, path)?;

    Ok(InvocationResult {
        success: coerce_bool(record.get("success")),
        error: optional_string(record, "error"),
        message: optional_string(record, "message"),
        summary: optional_string(record, "summary"),
        task_id: optional_string(record, "taskId"),
        resolved_mode: optional_string(record, "resolvedMode"),
        result: record.get("result").filter(|r| !r.is_null()).cloned(),
    })
}

/// Check that a raw dump is at least an object or array.
///
/// Raw context and raw LLM input are shown verbatim, so only the root is checked.
///
/// # Errors
///
/// Returns a contract error for scalar roots.
pub fn parse_raw_dump(value: Value, path: &str) -> Result<Value> {
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(InspectorError::contract(path, "expected an object or array"))
    }
}
