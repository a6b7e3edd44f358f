//! Session list, active selection and the last refreshed agent snapshot.

use chrono::{DateTime, Utc};
use ctx_inspector_client::{InspectorClient, Transport};
use ctx_inspector_core::{
    AgentId, AppSummary, Result, Session, SessionAgentKey, SessionId, Window,
};
use serde_json::Value;
use tracing::debug;

/// Everything fetched for the active session+agent in one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    /// Key the snapshot was taken for.
    pub key: SessionAgentKey,
    /// Windows in the agent's context.
    pub windows: Vec<Window>,
    /// Registered apps.
    pub apps: Vec<AppSummary>,
    /// Raw context dump.
    pub raw_context: Value,
    /// Raw LLM input dump.
    pub raw_llm_input: Value,
    /// When the refresh completed.
    pub refreshed_at: DateTime<Utc>,
}

/// Client-side view of backend sessions.
#[derive(Debug, Default)]
pub struct SessionState {
    sessions: Vec<Session>,
    active: Option<SessionAgentKey>,
    snapshot: Option<AgentSnapshot>,
}

impl SessionState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Known sessions, in backend order.
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Look up a known session.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.session_id == session_id)
    }

    /// Active session+agent pair.
    #[must_use]
    pub fn active(&self) -> Option<&SessionAgentKey> {
        self.active.as_ref()
    }

    /// Last successful snapshot of the active pair.
    #[must_use]
    pub fn snapshot(&self) -> Option<&AgentSnapshot> {
        self.snapshot.as_ref()
    }

    /// Replace the session list.
    ///
    /// Clears the selection if the active session disappeared.
    pub fn set_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
        let still_present = self
            .active
            .as_ref()
            .is_some_and(|key| self.session(&key.session_id).is_some());
        if !still_present {
            self.clear_active();
        }
    }

    /// Insert or replace one session.
    pub fn upsert_session(&mut self, session: Session) {
        match self
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
    }

    /// Forget a session. Clears the selection if it was active.
    pub fn remove_session(&mut self, session_id: &SessionId) {
        self.sessions.retain(|s| &s.session_id != session_id);
        if self
            .active
            .as_ref()
            .is_some_and(|key| &key.session_id == session_id)
        {
            self.clear_active();
        }
    }

    /// Select a session and agent. The snapshot is dropped if the key changed.
    pub fn set_active(&mut self, key: SessionAgentKey) {
        if self.active.as_ref() != Some(&key) {
            self.snapshot = None;
        }
        self.active = Some(key);
    }

    /// Clear the selection and the snapshot.
    pub fn clear_active(&mut self) {
        self.active = None;
        self.snapshot = None;
    }

    /// First agent of a session, if any.
    #[must_use]
    pub fn first_agent(session: &Session) -> Option<AgentId> {
        session.agents.first().map(|agent| agent.agent_id.clone())
    }

    /// Refetch the session and everything shown for `key`.
    ///
    /// All five requests run concurrently. Nothing is applied unless all of
    /// them succeed.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the previous state is left untouched.
    pub async fn refresh<T: Transport>(
        &mut self,
        client: &InspectorClient<T>,
        key: &SessionAgentKey,
    ) -> Result<()> {
        let (session, windows, apps, raw_context, raw_llm_input) = futures::try_join!(
            client.get_session(&key.session_id),
            client.list_windows(key),
            client.list_apps(key),
            client.raw_context(key),
            client.raw_llm_input(key),
        )?;

        debug!(
            key = %key,
            windows = windows.len(),
            apps = apps.len(),
            "Refreshed agent state"
        );

        self.upsert_session(session);
        self.snapshot = Some(AgentSnapshot {
            key: key.clone(),
            windows,
            apps,
            raw_context,
            raw_llm_input,
            refreshed_at: Utc::now(),
        });
        Ok(())
    }
}
