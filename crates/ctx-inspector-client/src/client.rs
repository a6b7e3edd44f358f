//! Typed client for the inspector backend REST API.
//!
//! Each method performs one request, maps non-2xx statuses to
//! [`InspectorError::Http`], decodes the body and hands it to the matching
//! parser in [`ctx_inspector_core::parse`].

use ctx_inspector_core::contract::{decode_json, looks_like_html};
use ctx_inspector_core::parse;
use ctx_inspector_core::{
    AppSummary, InspectorError, InteractionResult, InvocationResult, Result, Session,
    SessionAgentKey, SessionId, TimelineItem, Window,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::transport::{Method, Transport};

/// Longest plain-text error body echoed back in an HTTP error.
const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Client for the inspector backend.
#[derive(Debug, Clone)]
pub struct InspectorClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> InspectorClient<T> {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used for every request
    /// * `base_url` - Backend base URL (e.g., "http://127.0.0.1:3000")
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform a request and decode the body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        debug!(method = method.as_str(), path, "Backend request");

        let response = self
            .transport
            .request(&self.base_url, path, method, body)
            .await?;

        if !response.success {
            let message = error_detail(&response.body);
            warn!(
                method = method.as_str(),
                path,
                status = response.status,
                error = %message,
                "Backend request failed"
            );
            return Err(InspectorError::Http {
                status: response.status,
                message,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        decode_json(&response.body, path)
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// List all sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let value = self.call(Method::Get, "/sessions", None).await?;
        parse::parse_sessions(&value, "sessions")
    }

    /// Get one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        let value = self
            .call(Method::Get, &session_id.path(), None)
            .await?;
        parse::parse_session(&value, "session")
    }

    /// Create a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn create_session(&self) -> Result<Session> {
        let value = self.call(Method::Post, "/sessions", None).await?;
        parse::parse_session(&value, "session")
    }

    /// Close a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<()> {
        self.call(Method::Delete, &session_id.path(), None)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Agent Context
    // =========================================================================

    /// List the agent's windows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn list_windows(&self, key: &SessionAgentKey) -> Result<Vec<Window>> {
        let path = format!("{}/windows", key.agent_path());
        let value = self.call(Method::Get, &path, None).await?;
        parse::parse_windows(&value, "windows")
    }

    /// List the agent's apps.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn list_apps(&self, key: &SessionAgentKey) -> Result<Vec<AppSummary>> {
        let path = format!("{}/apps", key.agent_path());
        let value = self.call(Method::Get, &path, None).await?;
        parse::parse_apps(&value, "apps")
    }

    /// Fetch the agent's timeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn timeline(
        &self,
        key: &SessionAgentKey,
        include_obsolete: bool,
    ) -> Result<Vec<TimelineItem>> {
        let path = format!(
            "{}/timeline?includeObsolete={include_obsolete}",
            key.agent_path()
        );
        let value = self.call(Method::Get, &path, None).await?;
        parse::parse_timeline(&value, "timeline")
    }

    /// Fetch the raw context dump.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the root is not an object or array.
    pub async fn raw_context(&self, key: &SessionAgentKey) -> Result<Value> {
        let path = format!("{}/context/raw", key.agent_path());
        let value = self.call(Method::Get, &path, None).await?;
        parse::parse_raw_dump(value, "rawContext")
    }

    /// Fetch the raw LLM input dump.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the root is not an object or array.
    pub async fn raw_llm_input(&self, key: &SessionAgentKey) -> Result<Value> {
        let path = format!("{}/llm-input/raw", key.agent_path());
        let value = self.call(Method::Get, &path, None).await?;
        parse::parse_raw_dump(value, "rawLlmInput")
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Send a message and wait for the agent to finish handling it.
    ///
    /// A result with `success = false` is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn interact(&self, key: &SessionAgentKey, message: &str) -> Result<InteractionResult> {
        let path = format!("{}/interact", key.agent_path());
        let body = json!({ "message": message });
        let value = self.call(Method::Post, &path, Some(&body)).await?;
        parse::parse_interaction_result(&value, "interaction")
    }

    /// Invoke a window action.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn invoke_action(
        &self,
        key: &SessionAgentKey,
        window_id: &str,
        action_id: &str,
        params: Value,
    ) -> Result<InvocationResult> {
        let path = format!("{}/actions/invoke", key.agent_path());
        let body = json!({ "windowId": window_id, "actionId": action_id, "params": params });
        let value = self.call(Method::Post, &path, Some(&body)).await?;
        parse::parse_invocation_result(&value, "invocation")
    }

    /// Inject assistant output into the agent's context.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn simulate_assistant(
        &self,
        key: &SessionAgentKey,
        content: &str,
    ) -> Result<InvocationResult> {
        let path = format!("{}/simulate/assistant", key.agent_path());
        let body = json!({ "content": content });
        let value = self.call(Method::Post, &path, Some(&body)).await?;
        parse::parse_invocation_result(&value, "simulation")
    }

    /// Inject a tool result into the agent's context.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn simulate_tool(
        &self,
        key: &SessionAgentKey,
        tool_name: &str,
        content: &str,
    ) -> Result<InvocationResult> {
        let path = format!("{}/simulate/tool", key.agent_path());
        let body = json!({ "toolName": tool_name, "content": content });
        let value = self.call(Method::Post, &path, Some(&body)).await?;
        parse::parse_invocation_result(&value, "simulation")
    }
}

/// Pull a readable message out of an error body.
///
/// Tries `error`, `error.message` and `message` from a JSON body, then falls
/// back to an HTML notice or the trimmed text.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let detail = match value.get("error") {
            Some(Value::String(text)) => Some(text.as_str()),
            Some(error) => error.get("message").and_then(Value::as_str),
            None => None,
        }
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty());

        if let Some(detail) = detail {
            return detail.to_string();
        }
    }

    if looks_like_html(body) {
        return "received an HTML error page instead of JSON".to_string();
    }

    let text = body.trim();
    if text.is_empty() {
        return "request failed".to_string();
    }
    if text.chars().count() > MAX_ERROR_DETAIL_CHARS {
        let truncated: String = text.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
        return format!("{truncated}...");
    }
    text.to_string()
}
