//! Correlation persistence (storage half of component G).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vigil_types::Correlation;

use crate::StoreError;

/// Durable, append-only storage for [`Correlation`]s.
///
/// Correlations reference events only by id, never by back-pointer, so this
/// trait never needs to touch `EventStore`.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Append a new correlation. Callers are responsible for deduplicating
    /// against [`vigil_types::Correlation::dedup_key`] before calling this;
    /// the store itself does not enforce uniqueness.
    async fn add(&self, correlation: &Correlation) -> Result<(), StoreError>;

    /// Fetch a single correlation by id.
    async fn get(&self, id: Uuid) -> Result<Option<Correlation>, StoreError>;

    /// Fetch correlations detected within `[from, to]`, newest first.
    async fn get_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Correlation>, StoreError>;

    /// Delete correlations older than `max_age`, returning the number
    /// removed.
    async fn cleanup_older_than(&self, max_age: Duration) -> Result<u64, StoreError>;
}
