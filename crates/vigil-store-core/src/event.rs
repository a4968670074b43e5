//! Classified-event persistence and query filtering (component B).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_types::{RiskLevel, SecurityEvent, SecurityEventType};

use crate::StoreError;

/// Optional predicates for [`EventStore::get`] / [`EventStore::count`].
///
/// Every field is an AND-ed constraint; `None` means "no restriction on this
/// field". `has_correlation` filters on whether `correlation_ids` is
/// non-empty, independent of which correlation it belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Restrict to this classified event type.
    pub event_type: Option<SecurityEventType>,
    /// Restrict to this risk level exactly (not a minimum).
    pub risk_level: Option<RiskLevel>,
    /// Restrict to events observed on this host.
    pub host: Option<String>,
    /// Restrict to events attributed to this user.
    pub user: Option<String>,
    /// Lower bound (inclusive) on `original.time`.
    pub from_time: Option<DateTime<Utc>>,
    /// Upper bound (inclusive) on `original.time`.
    pub to_time: Option<DateTime<Utc>>,
    /// Restrict to events that do/don't carry at least one correlation id.
    pub has_correlation: Option<bool>,
}

impl EventFilter {
    /// Whether `event` satisfies every constraint set on this filter.
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        if let Some(t) = self.event_type {
            if event.event_type != t {
                return false;
            }
        }
        if let Some(r) = self.risk_level {
            if event.risk_level != r {
                return false;
            }
        }
        if let Some(ref host) = self.host {
            if &event.original.host != host {
                return false;
            }
        }
        if let Some(ref user) = self.user {
            if &event.original.user != user {
                return false;
            }
        }
        if let Some(from) = self.from_time {
            if event.original.time < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if event.original.time > to {
                return false;
            }
        }
        if let Some(want) = self.has_correlation {
            let has = event
                .correlation_ids
                .as_ref()
                .is_some_and(|ids| !ids.is_empty());
            if has != want {
                return false;
            }
        }
        true
    }
}

/// Default timeout a caller should apply around [`EventStore::health_check`],
/// per the concurrency model's health-probe default.
pub const HEALTH_CHECK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Durable storage for classified [`SecurityEvent`]s.
///
/// `add` is idempotent on `original.unique_id`: re-delivery of the same raw
/// record (after a reconnect with a stale bookmark, for instance) must not
/// create a duplicate row, mirroring `toka-store-sqlite`'s payload-dedup
/// `INSERT OR IGNORE` pattern.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert `event`, ignoring the call if `original.unique_id` is already
    /// present.
    async fn add(&self, event: &SecurityEvent) -> Result<(), StoreError>;

    /// Fetch a page of events matching `filter`, newest `original.time`
    /// first, ties broken by insertion order.
    async fn get(
        &self,
        page: u32,
        page_size: u32,
        filter: &EventFilter,
    ) -> Result<Vec<SecurityEvent>, StoreError>;

    /// Fetch a single event by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<SecurityEvent>, StoreError>;

    /// Count events matching `filter`.
    async fn count(&self, filter: &EventFilter) -> Result<u64, StoreError>;

    /// Cheap liveness probe, mirroring `toka-store-sqlite`'s use of a count
    /// query as a side-channel health check. The default implementation
    /// delegates to [`EventStore::count`]; callers bound the call with
    /// [`HEALTH_CHECK_TIMEOUT`] themselves (see `vigil-pipeline::health`).
    async fn health_check(&self) -> Result<(), StoreError> {
        self.count(&EventFilter::default()).await.map(|_| ())
    }
}
