//! Channel bookmark (resume token) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque, per-channel resume token plus the time it was last saved.
///
/// The store MUST preserve `token` byte-for-byte; it never interprets or
/// mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventBookmark {
    /// Channel this bookmark belongs to.
    pub channel: String,
    /// Opaque resume-token bytes.
    pub token: Vec<u8>,
    /// When this bookmark was last saved.
    pub last_updated: DateTime<Utc>,
}

impl EventBookmark {
    /// Construct a bookmark for `channel` with `token`, stamped `now`.
    pub fn new(channel: impl Into<String>, token: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            token,
            last_updated: Utc::now(),
        }
    }
}
