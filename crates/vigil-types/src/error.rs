//! Shared error taxonomy raised across the pipeline (spec §7).

use thiserror::Error;

use crate::action::ActionType;

/// Errors the core pipeline can raise.
///
/// Component crates may define narrower local error enums for their own
/// internal plumbing (e.g. `vigil-respond::OrchestratorError`) and convert
/// into `VigilError` at the pipeline boundary; this mirrors the teacher's
/// layering between `toka_runtime::RuntimeError` and lower-level crate
/// errors.
#[derive(Debug, Error)]
pub enum VigilError {
    /// An event fails schema invariants (missing `original`, or
    /// `event_type == Unknown` after a match attempt).
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A store's transient I/O failure, surfaced only after the local
    /// retry budget is exhausted.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A bookmark was unreadable or absent; non-fatal, the watcher resumes
    /// from the stream's current tail.
    #[error("bookmark corrupt for channel {channel}: {reason}")]
    BookmarkCorrupt {
        /// Channel whose bookmark was unreadable.
        channel: String,
        /// Human-readable reason.
        reason: String,
    },

    /// No handler is registered for the given action type.
    #[error("unsupported action type: {0}")]
    UnsupportedAction(ActionType),

    /// The action's parameters failed handler validation.
    #[error("invalid action data: {0}")]
    InvalidActionData(String),

    /// The conversation's pending-action quota has been reached.
    #[error("pending action quota exceeded for conversation {0}")]
    QuotaExceeded(String),

    /// The action expired before it could be executed.
    #[error("action {0} expired")]
    Expired(uuid::Uuid),

    /// The action has not been executed, so it cannot be rolled back.
    #[error("action {0} was never executed")]
    NotExecuted(uuid::Uuid),

    /// The action's undo window has elapsed.
    #[error("action {0} is outside its undo window")]
    OutsideUndoWindow(uuid::Uuid),

    /// Attempted to add/update a rule that would duplicate
    /// `(channel, event_id, priority)`.
    #[error("rule conflict: channel={channel} event_id={event_id} priority={priority}")]
    RuleConflict {
        /// Conflicting channel.
        channel: String,
        /// Conflicting event id.
        event_id: i64,
        /// Conflicting priority.
        priority: i32,
    },

    /// A health probe failed; transient, increments a failure counter.
    #[error("health check failed: {0}")]
    HealthCheckFailed(String),
}
