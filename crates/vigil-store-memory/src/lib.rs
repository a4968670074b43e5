#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-store-memory** – in-memory storage driver for vigil.
//!
//! A single [`MemoryStore`] implements every trait in `vigil-store-core`
//! over plain `Arc<RwLock<..>>` maps, mirroring `toka-store-memory`'s
//! `MemoryBackend`. Intended for tests and as the default backend for a
//! host that hasn't configured durable storage yet.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use vigil_store_core::{
    ActionStore, BookmarkStore, CorrelationStore, EventFilter, EventStore, RuleStore, StoreError,
    StoredRule,
};
use vigil_types::{ActionExecution, Correlation, EventBookmark, SecurityEvent, SecurityEventRule};

#[derive(Default)]
struct EventTable {
    by_id: HashMap<Uuid, SecurityEvent>,
    order: Vec<Uuid>,
    unique_ids: std::collections::HashSet<String>,
}

#[derive(Default)]
struct RuleTable {
    rows: HashMap<Uuid, SecurityEventRule>,
    version: AtomicU64,
}

/// In-memory implementation of every vigil storage trait.
#[derive(Clone)]
pub struct MemoryStore {
    bookmarks: Arc<RwLock<HashMap<String, EventBookmark>>>,
    events: Arc<RwLock<EventTable>>,
    rules: Arc<RwLock<RuleTable>>,
    actions: Arc<RwLock<HashMap<Uuid, ActionExecution>>>,
    correlations: Arc<RwLock<Vec<Correlation>>>,
}

impl MemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self {
            bookmarks: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(EventTable::default())),
            rules: Arc::new(RwLock::new(RuleTable::default())),
            actions: Arc::new(RwLock::new(HashMap::new())),
            correlations: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn load(&self, channel: &str) -> Result<Option<EventBookmark>, StoreError> {
        Ok(self.bookmarks.read().await.get(channel).cloned())
    }

    async fn save(&self, bookmark: &EventBookmark) -> Result<(), StoreError> {
        self.bookmarks
            .write()
            .await
            .insert(bookmark.channel.clone(), bookmark.clone());
        Ok(())
    }

    async fn delete(&self, channel: &str) -> Result<(), StoreError> {
        self.bookmarks.write().await.remove(channel);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn add(&self, event: &SecurityEvent) -> Result<(), StoreError> {
        let mut table = self.events.write().await;
        if table.unique_ids.contains(&event.original.unique_id) {
            return Ok(());
        }
        table.unique_ids.insert(event.original.unique_id.clone());
        table.order.push(event.id);
        table.by_id.insert(event.id, event.clone());
        Ok(())
    }

    async fn get(
        &self,
        page: u32,
        page_size: u32,
        filter: &EventFilter,
    ) -> Result<Vec<SecurityEvent>, StoreError> {
        let table = self.events.read().await;
        let mut matched: Vec<&SecurityEvent> = table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id))
            .filter(|e| filter.matches(e))
            .collect();
        matched.sort_by(|a, b| b.original.time.cmp(&a.original.time));
        let start = (page as usize) * (page_size as usize);
        Ok(matched
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SecurityEvent>, StoreError> {
        Ok(self.events.read().await.by_id.get(&id).cloned())
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64, StoreError> {
        let table = self.events.read().await;
        Ok(table
            .by_id
            .values()
            .filter(|e| filter.matches(e))
            .count() as u64)
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn insert(&self, rule: SecurityEventRule) -> Result<Uuid, StoreError> {
        let mut table = self.rules.write().await;
        if table.rows.values().any(|r| r.enabled && r.conflicts_with(&rule)) {
            return Err(StoreError::RuleConflict {
                channel: rule.channel,
                event_id: rule.event_id,
                priority: rule.priority,
            });
        }
        let id = Uuid::new_v4();
        table.rows.insert(id, rule);
        table.version.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, id: Uuid, rule: SecurityEventRule) -> Result<(), StoreError> {
        let mut table = self.rules.write().await;
        if !table.rows.contains_key(&id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if table
            .rows
            .iter()
            .any(|(other_id, r)| *other_id != id && r.enabled && r.conflicts_with(&rule))
        {
            return Err(StoreError::RuleConflict {
                channel: rule.channel,
                event_id: rule.event_id,
                priority: rule.priority,
            });
        }
        table.rows.insert(id, rule);
        table.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut table = self.rules.write().await;
        table.rows.remove(&id);
        table.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredRule>, StoreError> {
        Ok(self
            .rules
            .read()
            .await
            .rows
            .get(&id)
            .map(|rule| StoredRule {
                id,
                rule: rule.clone(),
            }))
    }

    async fn list_enabled(&self) -> Result<Vec<StoredRule>, StoreError> {
        Ok(self
            .rules
            .read()
            .await
            .rows
            .iter()
            .filter(|(_, r)| r.enabled)
            .map(|(id, rule)| StoredRule {
                id: *id,
                rule: rule.clone(),
            })
            .collect())
    }

    async fn invalidation_version(&self) -> Result<u64, StoreError> {
        Ok(self.rules.read().await.version.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn create(&self, action: &ActionExecution) -> Result<(), StoreError> {
        self.actions.write().await.insert(action.id, action.clone());
        Ok(())
    }

    async fn update(&self, action: &ActionExecution) -> Result<(), StoreError> {
        self.actions.write().await.insert(action.id, action.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ActionExecution>, StoreError> {
        Ok(self.actions.read().await.get(&id).cloned())
    }

    async fn list_pending(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError> {
        use vigil_types::ActionStatus;
        Ok(self
            .actions
            .read()
            .await
            .values()
            .filter(|a| a.conversation_id == conversation_id && a.status == ActionStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_history(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError> {
        let mut history: Vec<ActionExecution> = self
            .actions
            .read()
            .await
            .values()
            .filter(|a| a.conversation_id == conversation_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.suggested_at.cmp(&a.suggested_at));
        Ok(history)
    }

    async fn count_pending(&self, conversation_id: &str) -> Result<u64, StoreError> {
        use vigil_types::ActionStatus;
        Ok(self
            .actions
            .read()
            .await
            .values()
            .filter(|a| a.conversation_id == conversation_id && a.status == ActionStatus::Pending)
            .count() as u64)
    }
}

#[async_trait]
impl CorrelationStore for MemoryStore {
    async fn add(&self, correlation: &Correlation) -> Result<(), StoreError> {
        self.correlations.write().await.push(correlation.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Correlation>, StoreError> {
        Ok(self
            .correlations
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Correlation>, StoreError> {
        let mut matched: Vec<Correlation> = self
            .correlations
            .read()
            .await
            .iter()
            .filter(|c| c.detected_at >= from && c.detected_at <= to)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(matched)
    }

    async fn cleanup_older_than(&self, max_age: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - max_age;
        let mut correlations = self.correlations.write().await;
        let before = correlations.len();
        correlations.retain(|c| c.detected_at >= cutoff);
        Ok((before - correlations.len()) as u64)
    }
}
