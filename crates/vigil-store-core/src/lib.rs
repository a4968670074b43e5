#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-store-core** – Storage trait abstractions for vigil.
//!
//! This crate defines the persistence contracts every storage driver
//! (`vigil-store-memory`, `vigil-store-sqlite`) implements. It mirrors the
//! teacher workspace's split between `toka-store-core` (traits) and its
//! concrete drivers: the abstractions here carry no I/O of their own.

use thiserror::Error;

/// Bookmark store trait (component A).
pub mod bookmark;
/// Event store trait and filter model (component B).
pub mod event;
/// Rule store persistence trait (component E's storage half).
pub mod rule;
/// Action store trait (component H's persistence).
pub mod action;
/// Correlation store trait (component G's persistence).
pub mod correlation;

pub use action::ActionStore;
pub use bookmark::BookmarkStore;
pub use correlation::CorrelationStore;
pub use event::{EventFilter, EventStore, HEALTH_CHECK_TIMEOUT};
pub use rule::{RuleStore, StoredRule};

/// Errors raised by storage drivers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient I/O failure; the caller should retry with backoff before
    /// surfacing `vigil_types::VigilError::StorageUnavailable`.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The event failed schema invariants (e.g. missing required fields).
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    /// A rule insert/update would duplicate `(channel, event_id, priority)`.
    #[error("rule conflict: channel={channel} event_id={event_id} priority={priority}")]
    RuleConflict {
        /// Conflicting channel.
        channel: String,
        /// Conflicting event id.
        event_id: i64,
        /// Conflicting priority.
        priority: i32,
    },
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::{
        ActionStore, BookmarkStore, CorrelationStore, EventFilter, EventStore, RuleStore,
        StoreError, StoredRule,
    };
}
