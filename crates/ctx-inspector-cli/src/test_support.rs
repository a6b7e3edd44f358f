//! In-memory backend for unit tests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ctx_inspector_client::{Method, Transport, TransportResponse};
use ctx_inspector_core::{
    Agent, AgentId, InspectorError, Result, Session, SessionAgentKey, SessionId,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub fn key(session: &str, agent: &str) -> SessionAgentKey {
    SessionAgentKey::new(SessionId::new(session).unwrap(), AgentId::new(agent).unwrap())
}

pub fn session(id: &str, agents: &[&str]) -> Session {
    Session {
        session_id: SessionId::new(id).unwrap(),
        created_at: None,
        agents: agents
            .iter()
            .map(|agent| Agent {
                agent_id: AgentId::new(*agent).unwrap(),
                name: None,
                role: None,
            })
            .collect(),
        agent_count: agents.len(),
    }
}

pub fn timeline_item(seq: i64, item_type: &str, content: &str) -> Value {
    json!({
        "id": format!("item-{seq}"),
        "type": item_type,
        "seq": seq,
        "rawContent": content,
    })
}

/// One step the fake `interact` handler performs before replying.
#[derive(Debug, Clone)]
pub enum Step {
    Sleep(Duration),
    Push(Value),
}

/// What the fake `interact` handler does.
#[derive(Debug, Clone)]
pub struct InteractScript {
    pub steps: Vec<Step>,
    pub reply: std::result::Result<TransportResponse, InspectorError>,
}

impl InteractScript {
    pub fn reply(body: Value) -> Self {
        Self {
            steps: Vec::new(),
            reply: Ok(TransportResponse::new(200, body.to_string())),
        }
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

#[derive(Debug)]
pub struct FakeBackend {
    pub sessions: Vec<Session>,
    pub created: Vec<Session>,
    pub timeline: Vec<Value>,
    pub windows: Value,
    pub apps: Value,
    pub raw_context: Value,
    pub raw_llm_input: Value,
    pub invocation: Value,
    pub interact: InteractScript,
    /// 1-based timeline fetch numbers that answer with HTTP 500.
    pub failing_timeline_fetches: HashSet<usize>,
    pub timeline_fetches: usize,
    pub requests: Vec<(Method, String, Option<Value>)>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            created: Vec::new(),
            timeline: Vec::new(),
            windows: json!([]),
            apps: json!([]),
            raw_context: json!({ "messages": [] }),
            raw_llm_input: json!([]),
            invocation: json!({ "success": true }),
            interact: InteractScript::reply(json!({ "success": true })),
            failing_timeline_fetches: HashSet::new(),
            timeline_fetches: 0,
            requests: Vec::new(),
        }
    }
}

impl FakeBackend {
    pub fn add_session(&mut self, session: Session) {
        self.sessions.push(session);
    }

    fn route(&mut self, method: Method, path: &str) -> Routed {
        let route = path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = route.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["sessions"]) => ok(&self.sessions),
            (Method::Post, ["sessions"]) => {
                if self.created.is_empty() {
                    return error(500, "cannot create session");
                }
                let session = self.created.remove(0);
                self.sessions.push(session.clone());
                ok(&session)
            }
            (Method::Get, ["sessions", sid]) => match self.find(sid) {
                Some(session) => ok(session),
                None => error(404, "session not found"),
            },
            (Method::Delete, ["sessions", sid]) => {
                self.sessions.retain(|s| s.session_id.as_str() != *sid);
                Routed::Ready(TransportResponse::new(204, ""))
            }
            (_, ["sessions", _, "agents", _, rest @ ..]) => self.route_agent(method, rest),
            _ => error(404, "no route"),
        }
    }

    fn route_agent(&mut self, method: Method, rest: &[&str]) -> Routed {
        match (method, rest) {
            (Method::Get, ["windows"]) => ok(&self.windows),
            (Method::Get, ["apps"]) => ok(&self.apps),
            (Method::Get, ["context", "raw"]) => ok(&self.raw_context),
            (Method::Get, ["llm-input", "raw"]) => ok(&self.raw_llm_input),
            (Method::Get, ["timeline"]) => {
                self.timeline_fetches += 1;
                if self.failing_timeline_fetches.contains(&self.timeline_fetches) {
                    return error(500, "timeline unavailable");
                }
                ok(&self.timeline)
            }
            (Method::Post, ["interact"]) => Routed::Interact(self.interact.clone()),
            (Method::Post, ["actions", "invoke"] | ["simulate", _]) => ok(&self.invocation),
            _ => error(404, "no route"),
        }
    }

    fn find(&self, sid: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id.as_str() == sid)
    }
}

enum Routed {
    Ready(TransportResponse),
    Interact(InteractScript),
}

fn ok(body: &impl serde::Serialize) -> Routed {
    Routed::Ready(TransportResponse::new(
        200,
        serde_json::to_string(body).unwrap(),
    ))
}

fn error(status: u16, message: &str) -> Routed {
    Routed::Ready(TransportResponse::new(
        status,
        json!({ "error": message }).to_string(),
    ))
}

/// Transport answering from a [`FakeBackend`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    backend: Mutex<FakeBackend>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend<R>(&self, f: impl FnOnce(&mut FakeBackend) -> R) -> R {
        f(&mut self.backend.lock())
    }

    /// Paths requested so far, query strings included.
    pub fn paths(&self) -> Vec<String> {
        self.backend
            .lock()
            .requests
            .iter()
            .map(|(_, path, _)| path.clone())
            .collect()
    }

    /// Number of requests whose path contains `fragment`.
    pub fn count(&self, fragment: &str) -> usize {
        self.paths().iter().filter(|p| p.contains(fragment)).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        _base_url: &str,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<TransportResponse> {
        let routed = {
            let mut backend = self.backend.lock();
            backend
                .requests
                .push((method, path.to_string(), body.cloned()));
            backend.route(method, path)
        };

        match routed {
            Routed::Ready(response) => Ok(response),
            Routed::Interact(script) => {
                for step in script.steps {
                    match step {
                        Step::Sleep(duration) => tokio::time::sleep(duration).await,
                        Step::Push(item) => self.backend.lock().timeline.push(item),
                    }
                }
                script.reply
            }
        }
    }
}
