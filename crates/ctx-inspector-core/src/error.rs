//! Classified error type for the context inspector.
//!
//! Every failure the core can observe falls into one of a few kinds. Callers
//! branch on [`ErrorKind`] only to choose how to phrase the failure; nothing in
//! the core retries.

use thiserror::Error;

/// A result type using `InspectorError`.
pub type Result<T> = std::result::Result<T, InspectorError>;

/// Coarse classification of an [`InspectorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response (unreachable host, broken body).
    Network,
    /// The backend answered with a non-2xx status.
    Http,
    /// The body could not be decoded as JSON.
    Parse,
    /// The JSON decoded but does not have the expected shape.
    Contract,
    /// The backend reported that the interaction itself failed.
    Backend,
}

impl ErrorKind {
    /// Short lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Http => "http",
            Self::Parse => "parse",
            Self::Contract => "contract",
            Self::Backend => "backend",
        }
    }
}

/// Errors surfaced by the transport, the validator and the interaction flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectorError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code returned by the backend.
        status: u16,
        /// Detail extracted from the body.
        message: String,
    },

    /// Body is not valid JSON.
    #[error("parse error: {message}")]
    Parse {
        /// Description including an HTML-page hint when one applies.
        message: String,
    },

    /// Decoded JSON violates the expected shape.
    #[error("contract violation at {path}: {message}")]
    Contract {
        /// Dotted/indexed location of the offending value.
        path: String,
        /// What was expected there.
        message: String,
    },

    /// The interaction result carried `success = false`.
    #[error("interaction failed: {0}")]
    Backend(String),
}

impl InspectorError {
    /// Build a contract error for `path`.
    #[must_use]
    pub fn contract(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Contract {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::Http,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Contract { .. } => ErrorKind::Contract,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Operator-facing description, phrased by kind.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(message) => format!("Could not reach the inspector backend: {message}"),
            Self::Http { status, message } => {
                format!("The backend rejected the request (HTTP {status}): {message}")
            }
            Self::Parse { message } => format!("The backend response could not be read: {message}"),
            Self::Contract { path, message } => {
                format!("The backend response has an unexpected shape at {path}: {message}")
            }
            Self::Backend(message) => format!("The interaction failed: {message}"),
        }
    }
}
