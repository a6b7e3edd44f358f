//! Application state for the interactive client.
//!
//! `App` owns everything a front end needs: the client, the transcript, the
//! session state and the timeline tracker. Every operation takes `&mut self`,
//! so at most one interaction run can be active at a time.

use std::fmt::Write as _;
use std::time::Duration;

use ctx_inspector_client::{InspectorClient, Transport};
use ctx_inspector_core::{InvocationResult, Session, SessionAgentKey, SessionId, TimelineItem};
use serde_json::Value;
use tracing::info;

use crate::error::{AppError, Result};
use crate::orchestrator::{Orchestrator, RunReport};
use crate::state::SessionState;
use crate::tracker::TimelineTracker;
use crate::transcript::{Transcript, TranscriptEntry};

/// Application state.
#[derive(Debug)]
pub struct App<T> {
    /// Client for the inspector backend.
    client: InspectorClient<T>,
    /// Conversation log.
    pub transcript: Transcript,
    /// Sessions, selection and the last snapshot.
    pub state: SessionState,
    /// Assistant items already surfaced, per session+agent.
    tracker: TimelineTracker,
    /// Timeline poll cadence during runs.
    poll_interval: Duration,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
}

impl<T: Transport> App<T> {
    /// Create a new application.
    #[must_use]
    pub fn new(client: InspectorClient<T>, poll_interval: Duration) -> Self {
        Self {
            client,
            transcript: Transcript::new(),
            state: SessionState::new(),
            tracker: TimelineTracker::new(),
            poll_interval,
            status_message: None,
            error_message: None,
        }
    }

    /// Get the backend URL for display.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// The active session+agent pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` if nothing is selected.
    pub fn active_key(&self) -> Result<SessionAgentKey> {
        self.state.active().cloned().ok_or(AppError::NoActiveSession)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Reload the session list from the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn load_sessions(&mut self) -> Result<&[Session]> {
        let sessions = self.client.list_sessions().await?;
        self.set_status(format!("Loaded {} sessions", sessions.len()));
        self.state.set_sessions(sessions);
        Ok(self.state.sessions())
    }

    /// Create a session and select its first agent.
    ///
    /// Returns the selected key, or `None` if the session has no agent yet.
    ///
    /// # Errors
    ///
    /// Returns an error if creation or the follow-up refresh fails.
    pub async fn create_session(&mut self) -> Result<Option<SessionAgentKey>> {
        let session = self.client.create_session().await?;
        let session_id = session.session_id.clone();
        let agent_id = SessionState::first_agent(&session);
        self.state.upsert_session(session);
        info!(session_id = %session_id, "Created session");

        let Some(agent_id) = agent_id else {
            self.set_status(format!("Created session {session_id} (no agents)"));
            return Ok(None);
        };

        let key = SessionAgentKey::new(session_id, agent_id);
        self.state.set_active(key.clone());
        self.refresh_active().await?;
        self.set_status(format!("Created session {key}"));
        Ok(Some(key))
    }

    /// Close a session, or the active one if `session` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` if no session is given or active,
    /// `AppError::UnknownSession` for a blank ID, or the backend error.
    pub async fn close_session(&mut self, session: Option<&str>) -> Result<()> {
        let session_id = match session {
            Some(id) => {
                SessionId::new(id).map_err(|_| AppError::UnknownSession(id.to_string()))?
            }
            None => self.active_key()?.session_id,
        };

        self.client.close_session(&session_id).await?;
        self.state.remove_session(&session_id);
        self.tracker.forget_session(&session_id);
        info!(session_id = %session_id, "Closed session");

        self.set_status(format!("Closed session {session_id}"));
        Ok(())
    }

    /// Select a session and agent. The first agent is used if `agent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownSession` / `AppError::UnknownAgent` if the
    /// pair is not in the loaded session list, or the refresh error.
    pub async fn select(&mut self, session: &str, agent: Option<&str>) -> Result<SessionAgentKey> {
        let known = self
            .state
            .sessions()
            .iter()
            .find(|s| s.session_id.as_str() == session.trim())
            .ok_or_else(|| AppError::UnknownSession(session.to_string()))?;

        let agent_id = match agent {
            Some(agent) => known
                .agents
                .iter()
                .find(|a| a.agent_id.as_str() == agent.trim())
                .map(|a| a.agent_id.clone()),
            None => SessionState::first_agent(known),
        }
        .ok_or_else(|| AppError::UnknownAgent {
            session: session.to_string(),
            agent: agent.unwrap_or("<first>").to_string(),
        })?;

        let key = SessionAgentKey::new(known.session_id.clone(), agent_id);
        self.state.set_active(key.clone());
        self.refresh_active().await?;
        self.set_status(format!("Using {key}"));
        Ok(key)
    }

    /// Refresh the snapshot of the active pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` or the refresh error.
    pub async fn refresh_active(&mut self) -> Result<()> {
        let key = self.active_key()?;
        self.state.refresh(&self.client, &key).await?;
        Ok(())
    }

    /// Fetch the active agent's timeline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` or the backend error.
    pub async fn timeline(&self, include_obsolete: bool) -> Result<Vec<TimelineItem>> {
        let key = self.active_key()?;
        Ok(self.client.timeline(&key, include_obsolete).await?)
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Send a message to the active agent, creating a session if needed.
    ///
    /// # Errors
    ///
    /// Returns the run error. The transcript already describes it.
    pub async fn send_message(&mut self, message: &str) -> Result<RunReport> {
        let run = Orchestrator::new(&self.client)
            .with_poll_interval(self.poll_interval)
            .run(
                message,
                &mut self.state,
                &mut self.tracker,
                &mut self.transcript,
            )
            .await;
        let report = match run {
            Ok(report) => report,
            Err(err) => {
                self.set_error(err.user_message());
                return Err(err.into());
            }
        };

        match &report.refresh_error {
            Some(err) => self.set_error(err.user_message()),
            None => self.clear_error(),
        }
        Ok(report)
    }

    /// Invoke a window action on the active agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` or the backend error.
    pub async fn invoke_action(
        &mut self,
        window_id: &str,
        action_id: &str,
        params: Value,
    ) -> Result<InvocationResult> {
        let key = self.active_key()?;
        let result = self
            .client
            .invoke_action(&key, window_id, action_id, params)
            .await?;

        let label = format!("Action {action_id} on {window_id}");
        self.transcript
            .push(TranscriptEntry::system(invocation_line(&label, &result)));
        self.refresh_active().await?;
        Ok(result)
    }

    /// Inject assistant output into the active agent's context.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` or the backend error.
    pub async fn simulate_assistant(&mut self, content: &str) -> Result<InvocationResult> {
        let key = self.active_key()?;
        self.transcript.push(TranscriptEntry::simulator(content));

        let result = self.client.simulate_assistant(&key, content).await?;
        self.record_rejection("Assistant simulation", &result);
        self.refresh_active().await?;
        Ok(result)
    }

    /// Inject a tool result into the active agent's context.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` or the backend error.
    pub async fn simulate_tool(&mut self, tool_name: &str, content: &str) -> Result<InvocationResult> {
        let key = self.active_key()?;
        self.transcript
            .push(TranscriptEntry::simulator(format!("[{tool_name}] {content}")));

        let result = self.client.simulate_tool(&key, tool_name, content).await?;
        self.record_rejection("Tool simulation", &result);
        self.refresh_active().await?;
        Ok(result)
    }

    fn record_rejection(&mut self, label: &str, result: &InvocationResult) {
        if !result.success {
            self.transcript
                .push(TranscriptEntry::system(invocation_line(label, result)));
        }
    }
}

/// One-line description of an invocation outcome.
fn invocation_line(label: &str, result: &InvocationResult) -> String {
    if !result.success {
        let error = result.error.as_deref().unwrap_or("no details");
        return format!("{label} failed: {error}");
    }

    let mut line = format!("{label} succeeded");
    if let Some(detail) = result.summary.as_deref().or(result.message.as_deref()) {
        let _ = write!(line, ": {detail}");
    }
    if let Some(mode) = &result.resolved_mode {
        let _ = write!(line, " [{mode}]");
    }
    if let Some(task_id) = &result.task_id {
        let _ = write!(line, " (task {task_id})");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{key, session, InteractScript, ScriptedTransport};
    use crate::transcript::Role;
    use ctx_inspector_client::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn app() -> (Arc<ScriptedTransport>, App<Arc<ScriptedTransport>>) {
        let transport = Arc::new(ScriptedTransport::new());
        transport.with_backend(|b| {
            b.add_session(session("s1", &["a1", "a2"]));
            b.add_session(session("s2", &["b1"]));
        });
        let client = InspectorClient::new(Arc::clone(&transport), "http://backend");
        (transport, App::new(client, Duration::from_millis(700)))
    }

    #[tokio::test]
    async fn select_defaults_to_first_agent() {
        let (_, mut app) = app();
        app.load_sessions().await.unwrap();

        assert_eq!(app.select("s1", None).await.unwrap(), key("s1", "a1"));
        assert_eq!(app.select("s1", Some("a2")).await.unwrap(), key("s1", "a2"));
        assert!(app.state.snapshot().is_some());
    }

    #[tokio::test]
    async fn select_rejects_unknown_pairs() {
        let (_, mut app) = app();
        app.load_sessions().await.unwrap();

        assert!(matches!(
            app.select("nope", None).await,
            Err(AppError::UnknownSession(_))
        ));
        assert!(matches!(
            app.select("s2", Some("a1")).await,
            Err(AppError::UnknownAgent { .. })
        ));
    }

    #[tokio::test]
    async fn operations_need_active_session() {
        let (_, mut app) = app();

        assert!(matches!(
            app.invoke_action("w1", "close", json!({})).await,
            Err(AppError::NoActiveSession)
        ));
        assert!(matches!(
            app.close_session(None).await,
            Err(AppError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn closing_active_session_clears_state() {
        let (transport, mut app) = app();
        app.load_sessions().await.unwrap();
        app.select("s1", None).await.unwrap();
        transport.with_backend(|b| b.interact = InteractScript::reply(json!({ "success": true })));
        app.send_message("hello").await.unwrap();
        assert_eq!(app.tracker.tracked_keys(), 1);

        app.close_session(None).await.unwrap();

        assert!(app.state.active().is_none());
        assert!(app.state.snapshot().is_none());
        assert_eq!(app.tracker.tracked_keys(), 0);
        assert_eq!(app.state.sessions().len(), 1);
        let deleted = transport.with_backend(|b| {
            b.requests
                .iter()
                .any(|(method, path, _)| *method == Method::Delete && path == "/sessions/s1")
        });
        assert!(deleted);
    }

    #[tokio::test]
    async fn failed_run_sets_error_line() {
        let (transport, mut app) = app();
        app.load_sessions().await.unwrap();
        app.select("s1", None).await.unwrap();
        transport.with_backend(|b| {
            b.interact = InteractScript::reply(json!({ "success": false, "error": "model busy" }));
        });

        let err = app.send_message("hello").await.unwrap_err();

        assert_eq!(app.error_message.as_deref(), Some(err.user_message().as_str()));
        assert!(app.error_message.as_deref().unwrap().contains("model busy"));

        transport.with_backend(|b| b.interact = InteractScript::reply(json!({ "success": true })));
        app.send_message("again").await.unwrap();
        assert!(app.error_message.is_none());
    }

    #[tokio::test]
    async fn create_session_selects_first_agent() {
        let (transport, mut app) = app();
        transport.with_backend(|b| b.created.push(session("s3", &["c1"])));

        let created = app.create_session().await.unwrap();

        assert_eq!(created, Some(key("s3", "c1")));
        assert_eq!(app.state.active(), Some(&key("s3", "c1")));
        assert_eq!(app.status_message.as_deref(), Some("Created session s3/c1"));
    }

    #[tokio::test]
    async fn invoke_action_records_outcome() {
        let (transport, mut app) = app();
        transport.with_backend(|b| {
            b.invocation = json!({
                "success": true,
                "summary": "appended",
                "resolvedMode": "sync",
                "taskId": "t1"
            });
        });
        app.load_sessions().await.unwrap();
        app.select("s1", None).await.unwrap();

        let result = app
            .invoke_action("w1", "append", json!({ "text": "x" }))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(
            app.transcript.last().unwrap().content,
            "Action append on w1 succeeded: appended [sync] (task t1)"
        );
    }

    #[tokio::test]
    async fn simulations_append_simulator_entries() {
        let (transport, mut app) = app();
        app.load_sessions().await.unwrap();
        app.select("s2", None).await.unwrap();

        app.simulate_tool("shell", "exit 0").await.unwrap();
        transport.with_backend(|b| b.invocation = json!({ "success": false, "error": "busy" }));
        app.simulate_assistant("thinking").await.unwrap();

        let entries = app.transcript.entries();
        assert_eq!(entries[0].role, Role::Simulator);
        assert_eq!(entries[0].content, "[shell] exit 0");
        assert_eq!(entries[1].content, "thinking");
        assert_eq!(entries[2].role, Role::System);
        assert_eq!(entries[2].content, "Assistant simulation failed: busy");
    }
}
