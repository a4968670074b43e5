//! In-memory dead-letter store implementing `vigil_watch`'s
//! `DeadLetterSink` seam, with an operator-facing resolve API.

use async_trait::async_trait;
use dashmap::DashMap;
use vigil_watch::{DeadLetterEntry, DeadLetterSink};

/// Keys a poisoned record by the channel it came from and its `unique_id`.
type Key = (String, String);

/// Tracks poisoned records in memory and lets an operator mark one
/// resolved, unblocking its channel's bookmark.
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    entries: DashMap<Key, DeadLetterEntry>,
    resolved: DashMap<Key, ()>,
}

impl InMemoryDeadLetterStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All currently unresolved dead-letter entries.
    pub fn list(&self) -> Vec<DeadLetterEntry> {
        self.entries
            .iter()
            .filter(|e| !self.resolved.contains_key(e.key()))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Mark `(channel, unique_id)` resolved so its channel can skip the
    /// poisoned record and advance its bookmark past it.
    pub fn resolve(&self, channel: &str, unique_id: &str) {
        self.resolved.insert((channel.to_string(), unique_id.to_string()), ());
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterStore {
    async fn record(&self, entry: DeadLetterEntry) {
        tracing::warn!(
            channel = %entry.channel,
            unique_id = %entry.unique_id,
            error = %entry.last_error,
            "record moved to dead-letter set after repeated normalization failure"
        );
        let key = (entry.channel.clone(), entry.unique_id.clone());
        self.entries.insert(key, entry);
    }

    async fn is_resolved(&self, channel: &str, unique_id: &str) -> bool {
        self.resolved.contains_key(&(channel.to_string(), unique_id.to_string()))
    }
}
