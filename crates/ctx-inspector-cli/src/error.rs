//! Error types for the interactive client.

use ctx_inspector_core::InspectorError;

/// Errors raised by [`crate::app::App`] operations.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The operation needs a selected session and agent.
    #[error("no active session; use /new or /use <session> first")]
    NoActiveSession,

    /// The session is not in the loaded session list.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The agent is not part of the selected session.
    #[error("unknown agent {agent} in session {session}")]
    UnknownAgent {
        /// Session that was searched.
        session: String,
        /// Agent that was requested.
        agent: String,
    },

    /// Backend, transport or validation failure.
    #[error(transparent)]
    Inspector(#[from] InspectorError),
}

impl AppError {
    /// Operator-facing description.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Inspector(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// A result type using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
