//! Core types and response validation for the context inspector.
//!
//! This crate provides the foundation shared by the HTTP client and the
//! interaction front end:
//!
//! - **Identifiers**: opaque session and agent IDs, and the key pairing them
//! - **Error types**: the classified `InspectorError` used across crates
//! - **Contract validation**: primitives that turn untyped JSON into checked values
//! - **Parsers**: one function per backend response shape
//!
//! # Example
//!
//! ```
//! use ctx_inspector_core::parse::parse_session;
//!
//! let value = serde_json::json!({
//!     "sessionId": "s-1",
//!     "agents": [{ "agentId": "a-1", "name": "planner" }]
//! });
//!
//! let session = parse_session(&value, "session").unwrap();
//! assert_eq!(session.session_id.as_str(), "s-1");
//! assert!(session.created_at.is_none());
//! assert_eq!(session.agent_count, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod contract;
pub mod error;
pub mod ids;
pub mod parse;
pub mod types;

pub use error::{ErrorKind, InspectorError, Result};
pub use ids::{AgentId, IdError, SessionAgentKey, SessionId};
pub use types::{
    ActionOutcome, ActionTaken, Agent, AppSummary, InteractionResult, InteractionStep,
    InvocationResult, ParamKind, ParamProperty, ParamSchema, Session, TimelineItem, TokenUsage,
    Window, WindowAction,
};
