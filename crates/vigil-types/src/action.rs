//! Response action execution lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifies a registered response-action handler.
///
/// Backed by a `String` rather than a closed enum so host processes can
/// register additional action types without a `vigil` release, matching
/// the capability-interface redesign note in the spec (a tagged variant
/// resolved from a registry, not an inheritance hierarchy).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(pub String);

impl ActionType {
    /// Construct an `ActionType` from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an [`ActionExecution`].
///
/// Legal transitions: `Pending -> Executed | Failed | Expired`,
/// `Executed -> RolledBack`. All other transitions are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Suggested but not yet acted on.
    Pending,
    /// Successfully executed.
    Executed,
    /// Executed, then rolled back.
    RolledBack,
    /// Execution attempted and failed.
    Failed,
    /// Expired before it could be executed.
    Expired,
}

impl ActionStatus {
    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: ActionStatus) -> bool {
        matches!(
            (self, next),
            (ActionStatus::Pending, ActionStatus::Executed)
                | (ActionStatus::Pending, ActionStatus::Failed)
                | (ActionStatus::Pending, ActionStatus::Expired)
                | (ActionStatus::Executed, ActionStatus::RolledBack)
        )
    }
}

/// One structured entry in an action's append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionLogEntry {
    /// When this entry was recorded.
    pub at: DateTime<Utc>,
    /// Free-text, structured log message.
    pub message: String,
}

/// A suggested, executed and/or rolled-back response action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionExecution {
    /// Store-assigned unique identifier.
    pub id: Uuid,
    /// Conversation (session/correlation context) this action belongs to.
    pub conversation_id: String,
    /// Id of the message/finding that suggested this action.
    pub suggesting_message_id: String,
    /// Registered action type.
    pub r#type: ActionType,
    /// Opaque, handler-specific action parameters.
    pub action_data: Value,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// When the action was suggested.
    pub suggested_at: DateTime<Utc>,
    /// When the action was executed, if it was.
    pub executed_at: Option<DateTime<Utc>>,
    /// When the action was rolled back, if it was.
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Actor (user/system) that executed the action.
    pub executed_by: Option<String>,
    /// Actor that rolled back the action.
    pub rolled_back_by: Option<String>,
    /// Reason given for a rollback.
    pub rollback_reason: Option<String>,
    /// State captured before execution, for audit and rollback.
    pub before_state: Option<String>,
    /// State captured after execution.
    pub after_state: Option<String>,
    /// Append-only structured execution log.
    pub execution_log: Vec<ExecutionLogEntry>,
}

impl ActionExecution {
    /// Construct a new action in the `Pending` state.
    pub fn new_pending(
        conversation_id: String,
        suggesting_message_id: String,
        r#type: ActionType,
        action_data: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            suggesting_message_id,
            r#type,
            action_data,
            status: ActionStatus::Pending,
            suggested_at: Utc::now(),
            executed_at: None,
            rolled_back_at: None,
            executed_by: None,
            rolled_back_by: None,
            rollback_reason: None,
            before_state: None,
            after_state: None,
            execution_log: Vec::new(),
        }
    }

    /// Append a structured log entry.
    pub fn log(&mut self, message: impl Into<String>) {
        self.execution_log.push(ExecutionLogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_executed_is_legal() {
        assert!(ActionStatus::Pending.can_transition_to(ActionStatus::Executed));
    }

    #[test]
    fn executed_to_pending_is_illegal() {
        assert!(!ActionStatus::Executed.can_transition_to(ActionStatus::Pending));
    }

    #[test]
    fn rolled_back_is_terminal() {
        assert!(!ActionStatus::RolledBack.can_transition_to(ActionStatus::Executed));
        assert!(!ActionStatus::RolledBack.can_transition_to(ActionStatus::Pending));
    }

    #[test]
    fn double_rollback_is_illegal() {
        assert!(!ActionStatus::RolledBack.can_transition_to(ActionStatus::RolledBack));
    }
}
