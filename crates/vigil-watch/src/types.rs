//! Supporting types for the channel watcher.

use vigil_types::RawRecord;

/// Where a channel's bookmark is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkPersistence {
    /// Persist through the configured [`vigil_store_core::BookmarkStore`].
    Database,
    /// Never persist; the channel always resumes from the stream's tail.
    None,
}

/// Per-channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel name, e.g. `"Security"`.
    pub name: String,
    /// Whether this channel is watched at all.
    pub enabled: bool,
    /// Source-side filter expression (e.g. an XPath query), opaque to the
    /// watcher itself.
    pub xpath_filter: Option<String>,
    /// Where this channel's bookmark is persisted.
    pub bookmark_persistence: BookmarkPersistence,
    /// Bounded FIFO capacity for this channel; falls back to
    /// [`WatcherConfig::default_max_queue`] when `None`.
    pub max_queue: Option<usize>,
}

/// Global watcher tunables.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// FIFO capacity used by channels that don't set their own `max_queue`.
    pub default_max_queue: usize,
    /// Worker-pool size draining each channel's FIFO.
    pub consumer_concurrency: usize,
    /// Whether processed events are broadcast immediately (vs. batched);
    /// interpreted by the `RecordSink` the watcher is wired to.
    pub immediate_broadcast: bool,
    /// Minimum interval between two persisted bookmark saves for the same
    /// channel.
    pub bookmark_coalesce_interval: std::time::Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            default_max_queue: 10_000,
            consumer_concurrency: 4,
            immediate_broadcast: true,
            bookmark_coalesce_interval: std::time::Duration::from_millis(500),
        }
    }
}

/// A raw record paired with the opaque resume token a bookmark should
/// advance to once the record is successfully committed.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// The record itself.
    pub raw: RawRecord,
    /// Resume token a bookmark save should persist after this record
    /// commits.
    pub token: Vec<u8>,
}

/// Errors raised by the channel watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The channel source could not be subscribed to.
    #[error("failed to subscribe to channel {channel}: {reason}")]
    SubscriptionFailed {
        /// Channel that failed to subscribe.
        channel: String,
        /// Underlying reason.
        reason: String,
    },
    /// Normalization failed for a record.
    #[error("normalization failed: {0}")]
    NormalizationFailed(String),
    /// The downstream pipeline sink rejected a record.
    #[error("pipeline commit failed: {0}")]
    CommitFailed(String),
    /// The backing bookmark store was unavailable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<vigil_store_core::StoreError> for WatchError {
    fn from(e: vigil_store_core::StoreError) -> Self {
        WatchError::StorageUnavailable(e.to_string())
    }
}
