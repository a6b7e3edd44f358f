//! Interaction runs.
//!
//! A run sends one message to the active agent and surfaces the agent's
//! output as early as possible. While the `interact` request is in flight the
//! timeline is polled on a fixed cadence and new assistant items are appended
//! to the transcript as they appear. When the request resolves the poll loop
//! is dropped, one final fetch picks up anything produced after the last
//! tick, and a summary entry is built from the result.
//!
//! Every assistant sequence number reaches the transcript at most once per
//! run: the poll path and the final fetch share one [`TimelineTracker`].

use std::convert::Infallible;
use std::fmt::Write as _;
use std::time::Duration;

use ctx_inspector_client::{InspectorClient, Transport};
use ctx_inspector_core::{
    InspectorError, InteractionResult, InteractionStep, Result, SessionAgentKey, TimelineItem,
};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::SessionState;
use crate::tracker::TimelineTracker;
use crate::transcript::{Transcript, TranscriptEntry};

/// Default timeline poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(700);

/// Shortest accepted poll cadence.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stage of a run, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Resolving the session and agent to talk to.
    Preparing,
    /// Recording the message and snapshotting the timeline.
    Tracking,
    /// Waiting for `interact` while polling.
    Running,
    /// Final timeline fetch.
    Finalizing,
    /// Summary written and state refreshed.
    Done,
}

impl RunPhase {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Tracking => "tracking",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Session and agent the message went to.
    pub key: SessionAgentKey,
    /// Result returned by `interact`.
    pub result: InteractionResult,
    /// Assistant items surfaced from the timeline during the run.
    pub live_items: usize,
    /// Whether the `response` text was left out because live output covered it.
    pub response_suppressed: bool,
    /// Set if the post-run refresh failed.
    pub refresh_error: Option<InspectorError>,
}

/// Drives interaction runs against one client.
#[derive(Debug)]
pub struct Orchestrator<'a, T> {
    client: &'a InspectorClient<T>,
    poll_interval: Duration,
}

impl<'a, T: Transport> Orchestrator<'a, T> {
    /// Create an orchestrator with the default poll cadence.
    #[must_use]
    pub fn new(client: &'a InspectorClient<T>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll cadence.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Send `message` and run the interaction to completion.
    ///
    /// Uses the active session and agent, creating a session first if none is
    /// selected. Exclusive borrows of the state, tracker and transcript keep a
    /// second run from starting while this one is in progress.
    ///
    /// # Errors
    ///
    /// Returns the first failure of session creation, the initial timeline
    /// fetch or `interact`, or [`InspectorError::Backend`] if the result
    /// reports `success = false`. A system entry describing the error is
    /// appended before returning. Poll and final-fetch failures are logged and
    /// never returned.
    pub async fn run(
        &self,
        message: &str,
        state: &mut SessionState,
        tracker: &mut TimelineTracker,
        transcript: &mut Transcript,
    ) -> Result<RunReport> {
        enter(RunPhase::Preparing, None);
        let key = match self.prepare(state).await {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "Could not prepare interaction");
                transcript.push(TranscriptEntry::system(err.user_message()));
                return Err(err);
            }
        };

        enter(RunPhase::Tracking, Some(&key));
        transcript.push(TranscriptEntry::user(message));
        match self.client.timeline(&key, true).await {
            Ok(history) => tracker.initialize(&key, &history),
            Err(err) => return self.fail(err, &key, state, transcript).await,
        }

        enter(RunPhase::Running, Some(&key));
        let mut live_items = 0;
        let outcome = {
            let poll = self.poll(&key, tracker, transcript, &mut live_items);
            tokio::pin!(poll);

            tokio::select! {
                biased;
                outcome = self.client.interact(&key, message) => outcome,
                never = &mut poll => match never {},
            }
        };

        enter(RunPhase::Finalizing, Some(&key));
        if let Err(err) = self
            .surface_delta(&key, tracker, transcript, &mut live_items)
            .await
        {
            warn!(key = %key, error = %err, "Final timeline fetch failed");
        }

        let result = match outcome.and_then(require_success) {
            Ok(result) => result,
            Err(err) => return self.fail(err, &key, state, transcript).await,
        };

        let live_observed = live_items > 0;
        let response_suppressed = live_observed && response_text(&result).is_some();
        if let Some(entry) = summary_entry(&result, live_observed) {
            transcript.push(entry);
        }

        let refresh_error = self.refresh(state, &key, transcript).await.err();

        enter(RunPhase::Done, Some(&key));
        info!(
            key = %key,
            live_items,
            steps = result.steps.len(),
            "Interaction complete"
        );

        Ok(RunReport {
            key,
            result,
            live_items,
            response_suppressed,
            refresh_error,
        })
    }

    /// Resolve the key to talk to, creating a session if none is active.
    async fn prepare(&self, state: &mut SessionState) -> Result<SessionAgentKey> {
        if let Some(key) = state.active() {
            return Ok(key.clone());
        }

        let session = self.client.create_session().await?;
        let agent_id = SessionState::first_agent(&session);
        let session_id = session.session_id.clone();
        state.upsert_session(session);

        let agent_id = agent_id.ok_or_else(|| {
            InspectorError::contract("session.agents", "created session has no agent")
        })?;
        let key = SessionAgentKey::new(session_id, agent_id);
        info!(key = %key, "Created session for interaction");

        state.set_active(key.clone());
        Ok(key)
    }

    /// Poll the timeline until dropped.
    ///
    /// The first tick fires one interval after the call. Fetch errors are
    /// logged and the loop carries on.
    async fn poll(
        &self,
        key: &SessionAgentKey,
        tracker: &mut TimelineTracker,
        transcript: &mut Transcript,
        live_items: &mut usize,
    ) -> Infallible {
        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.surface_delta(key, tracker, transcript, live_items).await {
                Ok(0) => {}
                Ok(count) => debug!(key = %key, count, "Surfaced live assistant output"),
                Err(err) => warn!(key = %key, error = %err, "Timeline poll failed"),
            }
        }
    }

    /// Fetch the timeline and append unseen assistant items.
    async fn surface_delta(
        &self,
        key: &SessionAgentKey,
        tracker: &mut TimelineTracker,
        transcript: &mut Transcript,
        live_items: &mut usize,
    ) -> Result<usize> {
        let items = self.client.timeline(key, true).await?;
        let fresh = tracker.delta(key, &items);
        for item in &fresh {
            transcript.push(TranscriptEntry::assistant(live_text(item)));
        }
        *live_items += fresh.len();
        Ok(fresh.len())
    }

    /// Record a failed run, refresh, and hand the error back.
    async fn fail<R>(
        &self,
        err: InspectorError,
        key: &SessionAgentKey,
        state: &mut SessionState,
        transcript: &mut Transcript,
    ) -> Result<R> {
        warn!(key = %key, kind = err.kind().as_str(), error = %err, "Interaction failed");
        transcript.push(TranscriptEntry::system(err.user_message()));
        // Refresh failures are already logged and recorded in the transcript.
        let _ = self.refresh(state, key, transcript).await;
        enter(RunPhase::Done, Some(key));
        Err(err)
    }

    async fn refresh(
        &self,
        state: &mut SessionState,
        key: &SessionAgentKey,
        transcript: &mut Transcript,
    ) -> Result<()> {
        state.refresh(self.client, key).await.map_err(|err| {
            warn!(key = %key, error = %err, "State refresh failed");
            transcript.push(TranscriptEntry::system(format!(
                "Refresh failed: {}",
                err.user_message()
            )));
            err
        })
    }
}

fn enter(phase: RunPhase, key: Option<&SessionAgentKey>) {
    match key {
        Some(key) => debug!(phase = phase.as_str(), key = %key, "Interaction phase"),
        None => debug!(phase = phase.as_str(), "Interaction phase"),
    }
}

fn require_success(result: InteractionResult) -> Result<InteractionResult> {
    if result.success {
        Ok(result)
    } else {
        Err(InspectorError::Backend(result.error.unwrap_or_else(|| {
            "the backend reported a failure without details".to_string()
        })))
    }
}

/// Transcript text for a live timeline item.
fn live_text(item: &TimelineItem) -> String {
    if item.raw_content.trim().is_empty() {
        format!("[{} #{}]", item.item_type, item.seq)
    } else {
        item.raw_content.clone()
    }
}

fn response_text(result: &InteractionResult) -> Option<&str> {
    result
        .response
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Build the entry summarising a successful result.
///
/// The response line is dropped when live output was already shown. Without
/// a response line the entry is a system entry; with no lines at all there is
/// no entry.
fn summary_entry(result: &InteractionResult, live_observed: bool) -> Option<TranscriptEntry> {
    let response = response_text(result).filter(|_| !live_observed);

    let mut lines: Vec<String> = response.iter().map(|text| (*text).to_string()).collect();

    if let Some(action) = &result.action {
        let mut line = format!(
            "Action: {} on {}",
            action.action_id.as_deref().unwrap_or("?"),
            action.window_id.as_deref().unwrap_or("?")
        );
        if let Some(params) = &action.params {
            let _ = write!(line, " {params}");
        }
        lines.push(line);
    }

    if let Some(outcome) = &result.action_result {
        let mut line = format!("Action result: {}", status_word(outcome.success));
        if let Some(detail) = outcome.summary.as_deref().or(outcome.message.as_deref()) {
            let _ = write!(line, ": {detail}");
        }
        if let Some(task_id) = &outcome.task_id {
            let _ = write!(line, " (task {task_id})");
        }
        lines.push(line);
    }

    lines.extend(result.steps.iter().map(step_line));

    if let Some(usage) = &result.usage {
        lines.push(format!(
            "Usage: {} prompt + {} completion = {} tokens",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ));
    }

    if lines.is_empty() {
        return None;
    }

    let content = lines.join("\n");
    Some(if response.is_some() {
        TranscriptEntry::assistant(content)
    } else {
        TranscriptEntry::system(content)
    })
}

fn step_line(step: &InteractionStep) -> String {
    let mut line = format!(
        "Step {}.{}: {} on {}",
        step.turn, step.index, step.action_id, step.window_id
    );
    if !step.resolved_mode.is_empty() {
        let _ = write!(line, " [{}]", step.resolved_mode);
    }
    let _ = write!(line, " {}", status_word(step.success));
    if let Some(detail) = step.summary.as_deref().or(step.message.as_deref()) {
        let _ = write!(line, ": {detail}");
    }
    if let Some(task_id) = &step.task_id {
        let _ = write!(line, " (task {task_id})");
    }
    line
}

const fn status_word(success: bool) -> &'static str {
    if success {
        "succeeded"
    } else {
        "failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{key, session, timeline_item, InteractScript, ScriptedTransport, Step};
    use crate::transcript::Role;
    use ctx_inspector_client::TransportResponse;
    use ctx_inspector_core::parse::parse_interaction_result;
    use ctx_inspector_core::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;

    type Client = InspectorClient<Arc<ScriptedTransport>>;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        client: Client,
        state: SessionState,
        tracker: TimelineTracker,
        transcript: Transcript,
    }

    impl Harness {
        /// Backend with session s1/a1 selected.
        fn new() -> Self {
            let transport = Arc::new(ScriptedTransport::new());
            transport.with_backend(|b| b.add_session(session("s1", &["a1"])));
            let client = InspectorClient::new(Arc::clone(&transport), "http://backend");

            let mut state = SessionState::new();
            state.upsert_session(session("s1", &["a1"]));
            state.set_active(key("s1", "a1"));

            Self {
                transport,
                client,
                state,
                tracker: TimelineTracker::new(),
                transcript: Transcript::new(),
            }
        }

        fn script(&self, script: InteractScript) {
            self.transport.with_backend(|b| b.interact = script);
        }

        async fn run(&mut self, message: &str) -> Result<RunReport> {
            Orchestrator::new(&self.client)
                .run(
                    message,
                    &mut self.state,
                    &mut self.tracker,
                    &mut self.transcript,
                )
                .await
        }

        fn contents(&self, role: Role) -> Vec<&str> {
            self.transcript
                .entries()
                .iter()
                .filter(|e| e.role == role)
                .map(|e| e.content.as_str())
                .collect()
        }
    }

    fn ms(millis: u64) -> Step {
        Step::Sleep(Duration::from_millis(millis))
    }

    #[tokio::test(start_paused = true)]
    async fn response_without_live_output_is_one_assistant_entry() {
        let mut h = Harness::new();
        h.script(InteractScript::reply(json!({ "success": true, "response": "hi" })));

        let report = h.run("hello").await.unwrap();

        assert_eq!(h.contents(Role::User), vec!["hello"]);
        assert_eq!(h.contents(Role::Assistant), vec!["hi"]);
        assert_eq!(h.transcript.len(), 2);
        assert!(!report.response_suppressed);
        assert_eq!(report.live_items, 0);
        assert!(report.refresh_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn live_output_suppresses_response() {
        let mut h = Harness::new();
        h.script(
            InteractScript::reply(json!({ "success": true, "response": "hi" }))
                .then(ms(100))
                .then(Step::Push(timeline_item(7, "assistant_text", "hi")))
                .then(ms(1900)),
        );

        let report = h.run("hello").await.unwrap();

        assert_eq!(h.contents(Role::Assistant), vec!["hi"]);
        assert_eq!(h.transcript.count_role(Role::System), 0);
        assert!(report.response_suppressed);
        assert_eq!(report.live_items, 1);
        // One initial fetch, two ticks (700ms, 1400ms), one final fetch.
        assert_eq!(h.transport.count("/timeline"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn every_timeline_fetch_includes_obsolete_items() {
        let mut h = Harness::new();
        h.script(InteractScript::reply(json!({ "success": true })).then(ms(1500)));

        h.run("hello").await.unwrap();

        let fetches: Vec<String> = h
            .transport
            .paths()
            .into_iter()
            .filter(|p| p.contains("/timeline"))
            .collect();
        // Initial snapshot, ticks at 700ms and 1400ms, final fetch.
        assert_eq!(fetches.len(), 4);
        for path in &fetches {
            assert_eq!(path, "/sessions/s1/agents/a1/timeline?includeObsolete=true");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_item_is_caught_by_final_fetch() {
        let mut h = Harness::new();
        h.script(
            InteractScript::reply(json!({ "success": true, "response": "done" }))
                .then(ms(100))
                .then(Step::Push(timeline_item(8, "assistant_text", "late output"))),
        );

        let report = h.run("go").await.unwrap();

        assert_eq!(h.contents(Role::Assistant), vec!["late output"]);
        assert!(report.response_suppressed);
        assert_eq!(h.transport.count("/timeline"), 2);

        // The poll loop is gone once the run returns.
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.transport.count("/timeline"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_error_does_not_abort_run() {
        let mut h = Harness::new();
        h.transport
            .with_backend(|b| b.failing_timeline_fetches.insert(2));
        h.script(
            InteractScript::reply(json!({ "success": true, "response": "fine" }))
                .then(ms(1000))
                .then(Step::Push(timeline_item(3, "assistant_text", "partial")))
                .then(ms(500)),
        );

        let report = h.run("hello").await.unwrap();

        assert_eq!(h.contents(Role::Assistant), vec!["partial"]);
        assert_eq!(h.transcript.count_role(Role::System), 0);
        assert_eq!(report.live_items, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_not_resurfaced() {
        let mut h = Harness::new();
        h.transport.with_backend(|b| {
            b.timeline = vec![
                timeline_item(1, "user_message", "earlier question"),
                timeline_item(2, "assistant_text", "earlier answer"),
            ];
        });
        h.script(
            InteractScript::reply(json!({ "success": true }))
                .then(ms(800))
                .then(Step::Push(timeline_item(3, "Assistant-Text", "new answer")))
                .then(ms(800)),
        );

        let report = h.run("again").await.unwrap();

        assert_eq!(h.contents(Role::Assistant), vec!["new answer"]);
        assert!(!report.response_suppressed);
        assert_eq!(h.transcript.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_live_item_gets_placeholder() {
        let mut h = Harness::new();
        h.script(
            InteractScript::reply(json!({ "success": true }))
                .then(Step::Push(timeline_item(4, "assistant_tool_call", "  "))),
        );

        h.run("hello").await.unwrap();
        assert_eq!(h.contents(Role::Assistant), vec!["[assistant_tool_call #4]"]);
    }

    #[tokio::test(start_paused = true)]
    async fn http_failure_appends_system_entry() {
        let mut h = Harness::new();
        h.script(InteractScript {
            steps: vec![ms(300)],
            reply: Ok(TransportResponse::new(
                500,
                json!({ "error": "model offline" }).to_string(),
            )),
        });

        let err = h.run("hello").await.unwrap_err();

        assert_eq!(
            err,
            InspectorError::Http {
                status: 500,
                message: "model offline".into()
            }
        );
        let system = h.contents(Role::System);
        assert_eq!(system.len(), 1);
        assert!(system[0].contains("model offline"));
        assert_eq!(h.transcript.count_role(Role::Assistant), 0);
        // State is refreshed on the failure path too.
        assert_eq!(h.transport.count("/windows"), 1);
        assert!(h.state.snapshot().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_result_is_backend_error() {
        let mut h = Harness::new();
        h.script(InteractScript::reply(
            json!({ "success": false, "error": "no tool matched" }),
        ));

        let err = h.run("hello").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(h.contents(Role::System)[0].contains("no tool matched"));
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_is_reported() {
        let mut h = Harness::new();
        h.script(InteractScript {
            steps: Vec::new(),
            reply: Err(InspectorError::Network("connection reset".into())),
        });

        let err = h.run("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(h.transcript.count_role(Role::System), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_timeline_failure_skips_interact() {
        let mut h = Harness::new();
        h.transport
            .with_backend(|b| b.failing_timeline_fetches.insert(1));

        let err = h.run("hello").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(h.transport.count("/interact"), 0);
        assert_eq!(h.contents(Role::User), vec!["hello"]);
        assert_eq!(h.transcript.count_role(Role::System), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn creates_session_when_none_active() {
        let mut h = Harness::new();
        h.state.clear_active();
        h.transport
            .with_backend(|b| b.created.push(session("s9", &["a7", "a8"])));
        h.script(InteractScript::reply(json!({ "success": true, "response": "ready" })));

        let report = h.run("start").await.unwrap();

        assert_eq!(report.key, key("s9", "a7"));
        assert_eq!(h.state.active(), Some(&key("s9", "a7")));
        assert_eq!(h.transport.count("/sessions/s9/agents/a7/interact"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn created_session_without_agent_fails() {
        let mut h = Harness::new();
        h.state.clear_active();
        h.transport.with_backend(|b| b.created.push(session("s9", &[])));

        let err = h.run("start").await.unwrap_err();

        assert_eq!(
            err,
            InspectorError::contract("session.agents", "created session has no agent")
        );
        assert!(h.state.active().is_none());
        assert_eq!(h.transport.count("/interact"), 0);
        assert_eq!(h.contents(Role::User).len(), 0);
        assert_eq!(h.transcript.count_role(Role::System), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_failure_is_reported_not_returned() {
        let mut h = Harness::new();
        h.transport.with_backend(|b| b.raw_llm_input = json!(42));
        h.script(InteractScript::reply(json!({ "success": true, "response": "ok" })));

        let report = h.run("hello").await.unwrap();

        assert_eq!(report.refresh_error.unwrap().kind(), ErrorKind::Contract);
        assert!(h
            .transcript
            .last()
            .unwrap()
            .content
            .starts_with("Refresh failed"));
        assert!(h.state.snapshot().is_none());
    }

    #[test]
    fn summary_lists_every_detail() {
        let result = parse_interaction_result(
            &json!({
                "success": true,
                "action": { "windowId": "w1", "actionId": "append", "params": { "text": "x" } },
                "actionResult": { "success": true, "summary": "appended", "taskId": "t9" },
                "steps": [
                    { "callId": "c1", "windowId": "w1", "actionId": "append",
                      "resolvedMode": "sync", "success": true, "turn": 1, "index": 0 },
                    { "callId": "c2", "windowId": "w2", "actionId": "close",
                      "success": false, "message": "locked", "turn": 1, "index": 1 }
                ],
                "usage": { "promptTokens": 12, "completionTokens": 3, "totalTokens": 15 }
            }),
            "interaction",
        )
        .unwrap();

        let entry = summary_entry(&result, false).unwrap();
        assert_eq!(entry.role, Role::System);
        assert_eq!(
            entry.content.lines().collect::<Vec<_>>(),
            vec![
                r#"Action: append on w1 {"text":"x"}"#,
                "Action result: succeeded: appended (task t9)",
                "Step 1.0: append on w1 [sync] succeeded",
                "Step 1.1: close on w2 failed: locked",
                "Usage: 12 prompt + 3 completion = 15 tokens",
            ]
        );
    }

    #[test]
    fn summary_role_follows_response_line() {
        let result = parse_interaction_result(
            &json!({ "success": true, "response": "hi", "usage": { "totalTokens": 2 } }),
            "interaction",
        )
        .unwrap();

        let shown = summary_entry(&result, false).unwrap();
        assert_eq!(shown.role, Role::Assistant);
        assert!(shown.content.starts_with("hi\n"));

        let suppressed = summary_entry(&result, true).unwrap();
        assert_eq!(suppressed.role, Role::System);
        assert!(!suppressed.content.contains("hi"));
    }

    #[test]
    fn empty_result_has_no_summary() {
        let result = parse_interaction_result(&json!({ "success": true }), "r").unwrap();
        assert!(summary_entry(&result, false).is_none());
    }
}
