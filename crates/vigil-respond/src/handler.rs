//! Action-type handler registry.
//!
//! Grounded on `toka-kernel::registry`'s `RwLock<HashMap<_, _>>` opcode
//! dispatch table, generalized from opcode tags to action types and from
//! synchronous closures to an async trait object per handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use vigil_types::ActionType;

use crate::types::RespondError;

/// Operations a registered response-action handler must implement.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Validate `action_data` before a `Pending` action is created. Returns
    /// an error message (not an exception) describing why the data is
    /// invalid.
    async fn validate(&self, action_data: &Value) -> Result<(), String>;

    /// Capture whatever pre-execution state a later rollback will need to
    /// restore, serialized as an opaque string.
    async fn capture_before_state(&self, action_data: &Value) -> Result<Option<String>, String>;

    /// Perform the action, returning the opaque post-execution state.
    async fn execute(&self, action_data: &Value) -> Result<Option<String>, String>;

    /// Undo a previously executed action using the captured `before_state`.
    async fn rollback(&self, action_data: &Value, before_state: Option<&str>) -> Result<(), String>;
}

/// Registry of handlers keyed by [`ActionType`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<ActionType, Arc<dyn ActionHandler>>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `action_type`.
    pub async fn register(&self, action_type: ActionType, handler: Arc<dyn ActionHandler>) {
        self.handlers.write().await.insert(action_type, handler);
    }

    /// Fetch the handler for `action_type`, if registered.
    pub async fn get(&self, action_type: &ActionType) -> Result<Arc<dyn ActionHandler>, RespondError> {
        self.handlers
            .read()
            .await
            .get(action_type)
            .cloned()
            .ok_or_else(|| RespondError::UnsupportedAction(action_type.clone()))
    }
}
