//! The response orchestrator itself (component H).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;
use vigil_store_core::ActionStore;
use vigil_types::{ActionExecution, ActionStatus, ActionType};

use crate::handler::HandlerRegistry;
use crate::types::{OrchestratorConfig, OrchestratorStatistics, RespondError};

#[derive(Default)]
struct Counters {
    pending: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    rolled_back: AtomicU64,
    expired: AtomicU64,
}

/// Suggest/execute/rollback lifecycle over a registry of action-type
/// handlers, with per-action-id serialization and per-conversation quotas.
pub struct ResponseOrchestrator<S: ActionStore> {
    store: Arc<S>,
    handlers: Arc<HandlerRegistry>,
    config: OrchestratorConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    counters: Counters,
}

impl<S: ActionStore> ResponseOrchestrator<S> {
    /// Construct an orchestrator over `store` and `handlers`.
    pub fn new(store: Arc<S>, handlers: Arc<HandlerRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            store,
            handlers,
            config,
            locks: DashMap::new(),
            counters: Counters::default(),
        }
    }

    fn lock_for(&self, action_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(action_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// The undo window for `action_type`, falling back to the orchestrator's
    /// default when the type has no specific entry.
    pub fn undo_window(&self, action_type: &ActionType) -> Duration {
        self.config
            .undo_windows
            .get(action_type)
            .copied()
            .unwrap_or(self.config.default_undo_window)
    }

    /// Validate and persist a new `Pending` action, enforcing the
    /// per-conversation quota.
    pub async fn suggest(
        &self,
        conversation_id: String,
        message_id: String,
        action_type: ActionType,
        action_data: Value,
    ) -> Result<ActionExecution, RespondError> {
        let handler = self.handlers.get(&action_type).await?;
        handler
            .validate(&action_data)
            .await
            .map_err(RespondError::InvalidActionData)?;

        let pending = self.store.count_pending(&conversation_id).await?;
        if pending >= self.config.max_pending_actions_per_conversation {
            return Err(RespondError::QuotaExceeded(conversation_id));
        }

        let action = ActionExecution::new_pending(conversation_id, message_id, action_type, action_data);
        self.store.create(&action).await?;
        self.counters.pending.fetch_add(1, Ordering::Relaxed);
        Ok(action)
    }

    /// Execute a `Pending` action, transitioning it to `Executed` or
    /// `Failed`. Actions past `pending_expiration` (when `auto_expire` is
    /// set) are transitioned to `Expired` and rejected.
    pub async fn execute(&self, action_id: Uuid, actor: String) -> Result<ActionExecution, RespondError> {
        let lock = self.lock_for(action_id);
        let _guard = lock.lock().await;

        let mut action = self.store.get(action_id).await?.ok_or(RespondError::NotFound(action_id))?;
        if action.status != ActionStatus::Pending {
            return Err(RespondError::IllegalTransition(action_id));
        }

        let now = Utc::now();
        if self.config.auto_expire && now - action.suggested_at >= self.config.pending_expiration {
            action.status = ActionStatus::Expired;
            action.log("expired before execution");
            self.store.update(&action).await?;
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            return Err(RespondError::Expired(action_id));
        }

        let handler = self.handlers.get(&action.r#type).await?;
        action.before_state = handler
            .capture_before_state(&action.action_data)
            .await
            .map_err(RespondError::InvalidActionData)?;

        match handler.execute(&action.action_data).await {
            Ok(after_state) => {
                action.status = ActionStatus::Executed;
                action.executed_at = Some(now);
                action.executed_by = Some(actor);
                action.after_state = after_state;
                action.log("executed");
                self.counters.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(message) => {
                action.status = ActionStatus::Failed;
                action.executed_at = None;
                action.log(format!("execution failed: {message}"));
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.store.update(&action).await?;
        self.counters.pending.fetch_sub(1, Ordering::Relaxed);
        Ok(action)
    }

    /// Roll back a previously executed action, requiring it still be inside
    /// its undo window.
    pub async fn rollback(
        &self,
        action_id: Uuid,
        actor: String,
        reason: String,
    ) -> Result<ActionExecution, RespondError> {
        let lock = self.lock_for(action_id);
        let _guard = lock.lock().await;

        let mut action = self.store.get(action_id).await?.ok_or(RespondError::NotFound(action_id))?;
        if action.status != ActionStatus::Executed {
            return Err(RespondError::NotExecuted(action_id));
        }
        let executed_at = action.executed_at.ok_or(RespondError::NotExecuted(action_id))?;
        let now = Utc::now();
        if now - executed_at >= self.undo_window(&action.r#type) {
            return Err(RespondError::OutsideUndoWindow(action_id));
        }
        if !action.status.can_transition_to(ActionStatus::RolledBack) {
            return Err(RespondError::IllegalTransition(action_id));
        }

        let handler = self.handlers.get(&action.r#type).await?;
        handler
            .rollback(&action.action_data, action.before_state.as_deref())
            .await
            .map_err(|message| {
                warn!(action_id = %action_id, error = %message, "rollback handler failed");
                RespondError::InvalidActionData(message)
            })?;

        action.status = ActionStatus::RolledBack;
        action.rolled_back_at = Some(now);
        action.rolled_back_by = Some(actor);
        action.rollback_reason = Some(reason);
        action.log("rolled back");
        self.store.update(&action).await?;
        self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
        Ok(action)
    }

    /// Whether `action_id` can currently be rolled back.
    pub async fn can_rollback(&self, action_id: Uuid) -> Result<bool, RespondError> {
        let action = match self.store.get(action_id).await? {
            Some(a) => a,
            None => return Ok(false),
        };
        if action.status != ActionStatus::Executed {
            return Ok(false);
        }
        let Some(executed_at) = action.executed_at else {
            return Ok(false);
        };
        Ok(Utc::now() - executed_at < self.undo_window(&action.r#type))
    }

    /// Actions still `Pending` for `conversation_id`.
    pub async fn get_pending(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, RespondError> {
        Ok(self.store.list_pending(conversation_id).await?)
    }

    /// Every action (any status) for `conversation_id`, newest first.
    pub async fn get_history(&self, conversation_id: &str) -> Result<Vec<ActionExecution>, RespondError> {
        Ok(self.store.list_history(conversation_id).await?)
    }

    /// Running lifecycle totals since the orchestrator started. `pending` is
    /// a live gauge (incremented in `suggest`, decremented the moment an
    /// action leaves `Pending` in `execute`), not a cumulative counter like
    /// the other fields.
    pub fn get_statistics(&self) -> OrchestratorStatistics {
        OrchestratorStatistics {
            pending: self.counters.pending.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }
}
