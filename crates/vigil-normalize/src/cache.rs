//! Positive cache in front of the rule store (component E).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use vigil_store_core::{RuleStore, StoreError};
use vigil_types::SecurityEventRule;

/// Observability counters for [`RuleCache`].
#[derive(Debug, Default)]
pub struct RuleCacheStats {
    /// Reads served from the cached, fresh set.
    pub hits: AtomicU64,
    /// Reads that found the cache stale and triggered a reload.
    pub misses: AtomicU64,
    /// Reloads actually performed against the store (one per miss, except
    /// when a concurrent reload already refreshed the cache).
    pub reloads: AtomicU64,
}

impl RuleCacheStats {
    /// Snapshot the counters as plain integers.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.reloads.load(Ordering::Relaxed),
        )
    }
}

/// A full-enabled-set cache over a [`RuleStore`], invalidated on any
/// create/update/delete of a rule.
///
/// Mirrors `toka-kernel::registry`'s `Lazy<RwLock<HashMap<..>>>` registry
/// shape, generalized with an explicit staleness check against the store's
/// monotonic `invalidation_version` instead of being populated once at
/// process start.
pub struct RuleCache<S: RuleStore> {
    store: Arc<S>,
    rules: RwLock<Vec<SecurityEventRule>>,
    cached_version: AtomicU64,
    load_lock: Mutex<()>,
    stats: RuleCacheStats,
}

impl<S: RuleStore> RuleCache<S> {
    /// Construct an empty cache over `store`. The first call to
    /// [`RuleCache::resolve`] or [`RuleCache::all`] populates it.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            rules: RwLock::new(Vec::new()),
            cached_version: AtomicU64::new(u64::MAX),
            load_lock: Mutex::new(()),
            stats: RuleCacheStats::default(),
        }
    }

    /// Current cache statistics.
    pub fn stats(&self) -> &RuleCacheStats {
        &self.stats
    }

    async fn ensure_fresh(&self) -> Result<(), StoreError> {
        let store_version = self.store.invalidation_version().await?;
        if self.cached_version.load(Ordering::Acquire) == store_version {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        // Single in-flight loader: a second caller blocked on the lock will
        // find the version already current and skip the reload.
        let _guard = self.load_lock.lock().await;
        let store_version = self.store.invalidation_version().await?;
        if self.cached_version.load(Ordering::Acquire) == store_version {
            return Ok(());
        }

        let mut enabled: Vec<SecurityEventRule> = self
            .store
            .list_enabled()
            .await?
            .into_iter()
            .map(|stored| stored.rule)
            .collect();
        enabled.sort_by_key(|r| r.ordering_key());

        *self.rules.write().await = enabled;
        self.cached_version.store(store_version, Ordering::Release);
        self.stats.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Resolve the first enabled rule matching `(channel, event_id)` under
    /// `priority DESC, event_id ASC` ordering.
    pub async fn resolve(&self, channel: &str, event_id: i64) -> Result<Option<SecurityEventRule>, StoreError> {
        self.ensure_fresh().await?;
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .find(|r| r.channel == channel && r.event_id == event_id)
            .cloned())
    }

    /// The full cached, ordered rule set (for diagnostics and
    /// round-trip/idempotence checks).
    pub async fn all(&self) -> Result<Vec<SecurityEventRule>, StoreError> {
        self.ensure_fresh().await?;
        Ok(self.rules.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_store_memory::MemoryStore;
    use vigil_types::{RiskLevel, SecurityEventType};
    use std::collections::BTreeSet;

    fn rule(event_id: i64, priority: i32) -> SecurityEventRule {
        SecurityEventRule {
            event_id,
            channel: "Security".into(),
            event_type: SecurityEventType::AuthenticationSuccess,
            base_risk: RiskLevel::Medium,
            base_confidence: 85,
            summary_template: "logon by {user}".into(),
            mitre_techniques: BTreeSet::from(["T1078".to_string()]),
            recommended_actions: vec![],
            priority,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn resolves_first_match_by_priority() {
        let store = Arc::new(MemoryStore::new());
        store.insert(rule(4624, 1)).await.unwrap();
        let cache = RuleCache::new(store);

        let resolved = cache.resolve("Security", 4624).await.unwrap();
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let store = Arc::new(MemoryStore::new());
        let cache = RuleCache::new(store);
        assert!(cache.resolve("Security", 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reload_picks_up_new_rule_after_invalidation() {
        let store = Arc::new(MemoryStore::new());
        let cache = RuleCache::new(store.clone());
        assert!(cache.resolve("Security", 4624).await.unwrap().is_none());

        store.insert(rule(4624, 1)).await.unwrap();
        assert!(cache.resolve("Security", 4624).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unchanged_reload_yields_same_ordered_list() {
        let store = Arc::new(MemoryStore::new());
        store.insert(rule(4624, 5)).await.unwrap();
        store.insert(rule(4625, 1)).await.unwrap();
        let cache = RuleCache::new(store);

        let first = cache.all().await.unwrap();
        let second = cache.all().await.unwrap();
        assert_eq!(first, second);
    }
}
