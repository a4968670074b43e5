//! Response-action persistence (storage half of component H).

use async_trait::async_trait;
use uuid::Uuid;
use vigil_types::ActionExecution;

use crate::StoreError;

/// Durable storage for [`ActionExecution`] lifecycle records.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Persist a newly suggested (pending) action.
    async fn create(&self, action: &ActionExecution) -> Result<(), StoreError>;

    /// Overwrite the full record at `action.id`, used after a state
    /// transition (execute/rollback/expire) has been applied in memory.
    async fn update(&self, action: &ActionExecution) -> Result<(), StoreError>;

    /// Fetch a single action by id.
    async fn get(&self, id: Uuid) -> Result<Option<ActionExecution>, StoreError>;

    /// List actions still `Pending` for `conversation_id`.
    async fn list_pending(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError>;

    /// List every action (any status) for `conversation_id`, newest first.
    async fn list_history(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, StoreError>;

    /// Count actions still `Pending` for `conversation_id`, used to enforce
    /// the per-conversation quota without materializing the full list.
    async fn count_pending(&self, conversation_id: &str) -> Result<u64, StoreError>;
}
