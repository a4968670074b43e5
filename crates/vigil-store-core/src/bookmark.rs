//! Bookmark persistence (component A).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_types::EventBookmark;

use crate::StoreError;

/// Durable per-channel subscription position.
///
/// One bookmark is tracked per Windows Event Log channel. The watcher saves
/// coalesced updates at most every 500ms and flushes unconditionally on
/// shutdown; this trait only needs to support single-row upsert/read.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Load the bookmark for `channel`, if one has ever been saved.
    async fn load(&self, channel: &str) -> Result<Option<EventBookmark>, StoreError>;

    /// Upsert the bookmark for `channel`.
    async fn save(&self, bookmark: &EventBookmark) -> Result<(), StoreError>;

    /// Delete the bookmark for `channel`, forcing the next subscription to
    /// start from the channel's current tail.
    async fn delete(&self, channel: &str) -> Result<(), StoreError>;

    /// Whether a bookmark exists for `channel`.
    async fn exists(&self, channel: &str) -> Result<bool, StoreError> {
        Ok(self.load(channel).await?.is_some())
    }

    /// Timestamp of the last save for `channel`, if any.
    async fn last_updated(&self, channel: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.load(channel).await?.map(|b| b.last_updated))
    }
}
