//! The pipeline seam a committed record is handed to.

use async_trait::async_trait;
use vigil_types::SecurityEvent;

use crate::types::WatchError;

/// Everything downstream of normalization: ignore-pattern suppression, event
/// storage, correlation, response suggestion and broadcast. `vigil-pipeline`
/// wires the real implementation; the watcher only knows this seam.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Commit a classified event. Returning `Err` leaves the record
    /// un-acknowledged: the channel's bookmark is not advanced past it, so
    /// it is redelivered on restart.
    async fn commit(&self, event: SecurityEvent) -> Result<(), WatchError>;
}
