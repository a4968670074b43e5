//! Rule persistence (storage half of component E; the positive cache sitting
//! in front of this trait lives in `vigil-normalize`).

use async_trait::async_trait;
use uuid::Uuid;
use vigil_types::SecurityEventRule;

use crate::StoreError;

/// A persisted rule together with its storage-assigned identity.
///
/// `SecurityEventRule` itself has no id field — conflicts are detected on
/// `(channel, event_id, priority)` — so the store layer pairs each row with
/// a surrogate [`Uuid`] for update/delete addressing.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRule {
    /// Storage-assigned identity.
    pub id: Uuid,
    /// The rule itself.
    pub rule: SecurityEventRule,
}

/// Durable storage for [`SecurityEventRule`]s.
///
/// `vigil-normalize` reloads the full enabled set into its cache on startup
/// and whenever [`RuleStore::invalidation_version`] advances past the
/// version it last saw.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Insert a new rule. Fails with [`StoreError::RuleConflict`] if an
    /// enabled rule already occupies `(channel, event_id, priority)`.
    async fn insert(&self, rule: SecurityEventRule) -> Result<Uuid, StoreError>;

    /// Replace the rule at `id` in place.
    async fn update(&self, id: Uuid, rule: SecurityEventRule) -> Result<(), StoreError>;

    /// Remove the rule at `id`.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Fetch a single rule by id.
    async fn get(&self, id: Uuid) -> Result<Option<StoredRule>, StoreError>;

    /// Fetch every enabled rule, for cache repopulation. Ordering is left to
    /// the caller (`vigil-normalize` sorts by
    /// [`vigil_types::SecurityEventRule::ordering_key`]).
    async fn list_enabled(&self) -> Result<Vec<StoredRule>, StoreError>;

    /// Monotonically increasing counter bumped by every insert/update/delete,
    /// used by the cache to detect it is stale without re-fetching every
    /// poll interval.
    async fn invalidation_version(&self) -> Result<u64, StoreError>;
}
