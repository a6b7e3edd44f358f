//! Interactive client for the context inspector.
//!
//! This crate holds the interaction flow and the state a front end renders:
//!
//! - **Transcript**: append-only log with live subscribers
//! - **Tracker**: per session+agent record of surfaced assistant output
//! - **State**: session list, active selection and the refreshed snapshot
//! - **Orchestrator**: one `interact` run with concurrent timeline polling
//! - **App**: the operations the `ctxi` binary exposes as commands

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod commands;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod tracker;
pub mod transcript;

#[cfg(test)]
mod test_support;

pub use app::App;
pub use commands::{parse_command, Command, CommandError};
pub use error::AppError;
pub use orchestrator::{Orchestrator, RunPhase, RunReport, DEFAULT_POLL_INTERVAL};
pub use state::{AgentSnapshot, SessionState};
pub use tracker::{is_assistant_tag, TimelineTracker};
pub use transcript::{Role, Transcript, TranscriptEntry};
