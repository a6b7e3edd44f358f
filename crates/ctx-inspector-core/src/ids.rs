//! Identifier types for sessions and agents.
//!
//! The backend issues both IDs as opaque strings. The only invariant enforced
//! here is that they are non-empty after trimming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-issued session identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a `SessionId`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if nothing is left after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        non_empty(value.into()).map(Self)
    }

    /// Return the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL path addressing this session on the backend.
    ///
    /// The ID is percent-encoded as a single path segment.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/sessions/{}", urlencoding::encode(&self.0))
    }
}

impl FromStr for SessionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Agent identifier, unique within its session.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Create an `AgentId`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if nothing is left after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        non_empty(value.into()).map(Self)
    }

    /// Return the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

/// A session paired with one of its agents.
///
/// Timelines, seen-sets and snapshots are all scoped to this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAgentKey {
    /// The session.
    pub session_id: SessionId,
    /// The agent inside that session.
    pub agent_id: AgentId,
}

impl SessionAgentKey {
    /// Pair a session with an agent.
    #[must_use]
    pub const fn new(session_id: SessionId, agent_id: AgentId) -> Self {
        Self {
            session_id,
            agent_id,
        }
    }

    /// URL path prefix addressing this agent on the backend.
    #[must_use]
    pub fn agent_path(&self) -> String {
        format!(
            "{}/agents/{}",
            self.session_id.path(),
            urlencoding::encode(self.agent_id.as_str())
        )
    }
}

impl fmt::Display for SessionAgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.agent_id)
    }
}

fn non_empty(value: String) -> Result<String, IdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Errors that can occur when constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty or whitespace only.
    #[error("identifier must not be empty")]
    Empty,
}
