//! Timeline delta tracking.
//!
//! The timeline is refetched whole on every poll. The tracker remembers which
//! assistant sequence numbers were already surfaced for each session+agent
//! pair, so each fetch yields only the new assistant items.

use std::collections::{HashMap, HashSet};

use ctx_inspector_core::{SessionAgentKey, SessionId, TimelineItem};

/// Whether a timeline type tag marks agent output.
///
/// Case, whitespace, `-` and `_` are ignored: `assistant_text`,
/// `Assistant-Message` and ` ASSISTANT ` all match.
#[must_use]
pub fn is_assistant_tag(tag: &str) -> bool {
    let normalized: String = tag
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    normalized.starts_with("assistant")
}

/// Seen-sets of assistant sequence numbers, keyed by session+agent.
#[derive(Debug, Default)]
pub struct TimelineTracker {
    seen: HashMap<SessionAgentKey, HashSet<i64>>,
}

impl TimelineTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every assistant item in `items` as already surfaced.
    ///
    /// Replaces whatever was recorded for `key` before.
    pub fn initialize(&mut self, key: &SessionAgentKey, items: &[TimelineItem]) {
        let seen = items
            .iter()
            .filter(|item| is_assistant_tag(&item.item_type))
            .map(|item| item.seq)
            .collect();
        self.seen.insert(key.clone(), seen);
    }

    /// Return assistant items not surfaced yet, ascending by `seq`, and mark them.
    pub fn delta(&mut self, key: &SessionAgentKey, items: &[TimelineItem]) -> Vec<TimelineItem> {
        let seen = self.seen.entry(key.clone()).or_default();

        let mut fresh: Vec<&TimelineItem> = items
            .iter()
            .filter(|item| is_assistant_tag(&item.item_type) && !seen.contains(&item.seq))
            .collect();
        fresh.sort_by_key(|item| item.seq);

        fresh
            .into_iter()
            .filter(|item| seen.insert(item.seq))
            .cloned()
            .collect()
    }

    /// Whether `seq` was already surfaced for `key`.
    #[must_use]
    pub fn is_seen(&self, key: &SessionAgentKey, seq: i64) -> bool {
        self.seen.get(key).is_some_and(|seen| seen.contains(&seq))
    }

    /// Drop the seen-sets of every agent in a closed session.
    pub fn forget_session(&mut self, session_id: &SessionId) {
        self.seen.retain(|key, _| &key.session_id != session_id);
    }

    /// Number of tracked session+agent pairs.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.seen.len()
    }
}
