//! Periodic store health probing (§5: 5 s default timeout).
//!
//! Grounded on `toka-store-raft`'s `health_check_interval` tunable and
//! `toka-performance::ComponentHealth`'s two-state model, simplified to the
//! single failure-counter behavior §7's `HealthCheckFailed` describes: a
//! failed probe increments a counter and flips status to `Unhealthy` until
//! the next successful probe.

use std::sync::atomic::{AtomicU64, AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use vigil_store_core::EventStore;

/// Current store health as observed by the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The last probe completed within the timeout.
    Healthy,
    /// The last probe timed out or errored.
    Unhealthy,
}

/// Shared, lock-free health state updated by the background probe task.
#[derive(Debug, Default)]
pub struct HealthState {
    unhealthy: AtomicBool,
    failure_count: AtomicU64,
}

impl HealthState {
    /// Current status.
    pub fn status(&self) -> HealthStatus {
        if self.unhealthy.load(Ordering::Acquire) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }

    /// Total number of failed probes observed so far.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    fn record_success(&self) {
        self.unhealthy.store(false, Ordering::Release);
    }

    fn record_failure(&self) {
        self.unhealthy.store(true, Ordering::Release);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Periodically probes `store` with a bounded timeout until `token` is
/// cancelled.
pub async fn run_health_probe<St: EventStore + Send + Sync + 'static>(
    store: Arc<St>,
    state: Arc<HealthState>,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let probe = store.health_check();
                match tokio::time::timeout(timeout, probe).await {
                    Ok(Ok(_)) => state.record_success(),
                    Ok(Err(err)) => {
                        warn!(error = %err, "store health probe failed");
                        state.record_failure();
                    }
                    Err(_) => {
                        warn!(timeout_ms = timeout.as_millis() as u64, "store health probe timed out");
                        state.record_failure();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_healthy() {
        let state = HealthState::default();
        assert_eq!(state.status(), HealthStatus::Healthy);
        assert_eq!(state.failure_count(), 0);
    }

    #[test]
    fn failure_flips_status_and_increments_counter() {
        let state = HealthState::default();
        state.record_failure();
        assert_eq!(state.status(), HealthStatus::Unhealthy);
        assert_eq!(state.failure_count(), 1);
    }

    #[test]
    fn success_after_failure_clears_status_but_not_the_counter() {
        let state = HealthState::default();
        state.record_failure();
        state.record_success();
        assert_eq!(state.status(), HealthStatus::Healthy);
        assert_eq!(state.failure_count(), 1);
    }
}
