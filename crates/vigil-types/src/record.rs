//! Raw and normalized log record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque input record as delivered by a channel watcher.
///
/// `RawRecord` is immutable once constructed: the watcher owns it until it
/// is handed to the normalizer, which consumes it and discards the original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    /// Source-assigned record identifier (e.g. an Event Record ID).
    pub id: String,
    /// Channel the record was read from (e.g. `"Security"`).
    pub channel: String,
    /// Numeric event identifier as assigned by the provider.
    pub event_id: i64,
    /// Provider/publisher name that logged the record.
    pub provider: String,
    /// Severity level as reported by the source.
    pub level: String,
    /// Wall-clock time the record was logged.
    pub time: DateTime<Utc>,
    /// Host the record originated from.
    pub host: String,
    /// User associated with the record, if any.
    pub user: String,
    /// Human-readable rendered message.
    pub message: String,
    /// Raw XML (or other structured) payload as provided by the source.
    pub xml: String,
}

/// Normalized view of a [`RawRecord`].
///
/// `unique_id` is stable across redeliveries of the same underlying source
/// record (e.g. after a crash and bookmark replay) and is the key the event
/// store uses to guarantee idempotent `add`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    /// Wall-clock time the record was logged.
    pub time: DateTime<Utc>,
    /// Host the record originated from.
    pub host: String,
    /// Channel the record was read from.
    pub channel: String,
    /// Numeric event identifier as assigned by the provider.
    pub event_id: i64,
    /// Severity level as reported by the source.
    pub level: String,
    /// User associated with the record, if any.
    pub user: String,
    /// Human-readable rendered message.
    pub message: String,
    /// Raw payload re-serialized as JSON for storage/inspection.
    pub raw_json: String,
    /// Stable identifier, unique per source record across redeliveries.
    pub unique_id: String,
}

impl LogEvent {
    /// Derive the canonical `unique_id` for a raw record.
    ///
    /// The id is a composite of the source id, channel and host: stable
    /// across redeliveries (same record re-read after a crash yields the
    /// same id) but distinct across channels/hosts sharing a numeric id.
    pub fn unique_id_for(record: &RawRecord) -> String {
        format!("{}:{}:{}", record.channel, record.host, record.id)
    }

    /// Normalize a [`RawRecord`] into a [`LogEvent`], discarding the original.
    pub fn from_raw(record: RawRecord) -> Self {
        let unique_id = Self::unique_id_for(&record);
        let raw_json = serde_json::json!({
            "id": record.id,
            "provider": record.provider,
            "xml": record.xml,
        })
        .to_string();

        Self {
            time: record.time,
            host: record.host,
            channel: record.channel,
            event_id: record.event_id,
            level: record.level,
            user: record.user,
            message: record.message,
            raw_json,
            unique_id,
        }
    }
}
