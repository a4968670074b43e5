//! Poison-event tracking: a record whose normalization keeps failing is
//! moved to a dead-letter set after 3 consecutive failures and blocks its
//! channel's bookmark from advancing past it until resolved.

use async_trait::async_trait;
use vigil_types::RawRecord;

/// Consecutive normalization failures tolerated for the same `unique_id`
/// before a record is considered poisoned.
pub const DEAD_LETTER_THRESHOLD: u32 = 3;

/// A record that crossed [`DEAD_LETTER_THRESHOLD`].
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    /// Channel the record came from.
    pub channel: String,
    /// The record's stable `unique_id`.
    pub unique_id: String,
    /// The raw record itself, for operator inspection.
    pub raw: RawRecord,
    /// The last normalization error observed.
    pub last_error: String,
}

/// Where poisoned records go, and how an operator marks one resolved so its
/// channel can skip past it. `vigil-pipeline` owns the real implementation;
/// the watcher only knows this seam.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Record `entry` as poisoned. Called once, the first time a record
    /// crosses the threshold.
    async fn record(&self, entry: DeadLetterEntry);

    /// Whether `unique_id` on `channel` has been marked resolved, allowing
    /// the channel to skip it and advance its bookmark past it.
    async fn is_resolved(&self, channel: &str, unique_id: &str) -> bool;
}

/// A sink that never dead-letters anything; every record is retried
/// indefinitely. Used where no operator-facing dead-letter store is wired
/// up.
#[derive(Debug, Default)]
pub struct NoopDeadLetterSink;

#[async_trait]
impl DeadLetterSink for NoopDeadLetterSink {
    async fn record(&self, _entry: DeadLetterEntry) {}

    async fn is_resolved(&self, _channel: &str, _unique_id: &str) -> bool {
        false
    }
}
