//! Supporting types for the response orchestrator.

use std::collections::HashMap;

use chrono::Duration;
use uuid::Uuid;
use vigil_types::ActionType;

/// Errors raised by [`crate::engine::ResponseOrchestrator`].
#[derive(Debug, thiserror::Error)]
pub enum RespondError {
    /// No handler is registered for the action's `type`.
    #[error("unsupported action type: {0}")]
    UnsupportedAction(ActionType),
    /// The handler rejected `action_data` during `suggest`.
    #[error("invalid action data: {0}")]
    InvalidActionData(String),
    /// The conversation already has `max_pending_actions_per_conversation`
    /// pending actions.
    #[error("pending-action quota exceeded for conversation {0}")]
    QuotaExceeded(String),
    /// `execute` or `rollback` referenced an unknown action id.
    #[error("unknown action: {0}")]
    NotFound(Uuid),
    /// `execute` was called on an action that is not `Pending`, or is
    /// `Pending` but past its expiration.
    #[error("action {0} has expired")]
    Expired(Uuid),
    /// `rollback` was called on an action whose undo window has elapsed.
    #[error("action {0} is outside its undo window")]
    OutsideUndoWindow(Uuid),
    /// `rollback` was called on an action that was never `Executed`.
    #[error("action {0} was never executed")]
    NotExecuted(Uuid),
    /// The requested status transition is illegal from the action's current
    /// status.
    #[error("illegal transition for action {0}")]
    IllegalTransition(Uuid),
    /// The backing action store was unavailable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<vigil_store_core::StoreError> for RespondError {
    fn from(e: vigil_store_core::StoreError) -> Self {
        RespondError::StorageUnavailable(e.to_string())
    }
}

/// Tunables for [`crate::engine::ResponseOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum `Pending` actions allowed per conversation at once.
    pub max_pending_actions_per_conversation: u64,
    /// Whether `execute` rejects actions that have aged past
    /// `pending_expiration`.
    pub auto_expire: bool,
    /// How long a suggested action may remain `Pending` before `execute`
    /// treats it as `Expired`.
    pub pending_expiration: Duration,
    /// Per-action-type undo window, consulted by `undo_window`. Types
    /// absent from this map fall back to `default_undo_window`.
    pub undo_windows: HashMap<ActionType, Duration>,
    /// Undo window used for action types with no entry in `undo_windows`.
    pub default_undo_window: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_pending_actions_per_conversation: 20,
            auto_expire: true,
            pending_expiration: Duration::hours(1),
            undo_windows: HashMap::new(),
            default_undo_window: Duration::minutes(15),
        }
    }
}

/// Running totals surfaced by
/// [`crate::engine::ResponseOrchestrator::get_statistics`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorStatistics {
    /// Actions currently `Pending`, across all conversations.
    pub pending: u64,
    /// Actions that reached `Executed` (including later rolled back).
    pub executed: u64,
    /// Actions that reached `Failed`.
    pub failed: u64,
    /// Actions that reached `RolledBack`.
    pub rolled_back: u64,
    /// Actions that reached `Expired`.
    pub expired: u64,
}
