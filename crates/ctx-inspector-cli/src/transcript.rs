//! Append-only conversation log.
//!
//! Entries are never edited or removed. Renderers subscribe to receive each
//! entry as it is appended, which lets them print live output while an
//! interaction run holds the transcript mutably.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The operator.
    User,
    /// The agent.
    Assistant,
    /// The client itself (summaries, errors).
    System,
    /// Output injected through a simulation endpoint.
    Simulator,
}

impl Role {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Simulator => "simulator",
        }
    }
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    /// Create an entry stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a user entry.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant entry.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system entry.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a simulator entry.
    pub fn simulator(content: impl Into<String>) -> Self {
        Self::new(Role::Simulator, content)
    }
}

/// Ordered log of entries.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    subscribers: Vec<mpsc::UnboundedSender<TranscriptEntry>>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and forward it to live subscribers.
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.subscribers
            .retain(|subscriber| subscriber.send(entry.clone()).is_ok());
        self.entries.push(entry);
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// All entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with the given role.
    #[must_use]
    pub fn count_role(&self, role: Role) -> usize {
        self.entries.iter().filter(|e| e.role == role).count()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::user("hello"));
        transcript.push(TranscriptEntry::assistant("hi"));
        transcript.push(TranscriptEntry::system("done"));

        let roles: Vec<Role> = transcript.entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::System]);
        assert_eq!(transcript.count_role(Role::Assistant), 1);
        assert_eq!(transcript.last().unwrap().content, "done");
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = TranscriptEntry::user("x");
        let b = TranscriptEntry::user("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn subscribers_receive_appends() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::user("before"));

        let mut rx = transcript.subscribe();
        transcript.push(TranscriptEntry::simulator("after"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.role, Role::Simulator);
        assert_eq!(received.content, "after");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut transcript = Transcript::new();
        let rx = transcript.subscribe();
        drop(rx);

        transcript.push(TranscriptEntry::user("x"));
        assert!(transcript.subscribers.is_empty());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(TranscriptEntry::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
