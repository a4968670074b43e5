#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-bus** – Fan-out broadcaster for vigil pipeline outputs.
//!
//! This is component I from the spec: a best-effort publish/subscribe fan-out
//! of finished [`SecurityEvent`]s and [`Correlation`]s (plus the opaque
//! out-of-core streams named at the external boundary — scan progress,
//! system metrics, threat-intel status) to subscribers such as the admin UI
//! or notification transports. Delivery never blocks pipeline progress:
//! subscribers that fall behind lose the oldest buffered messages rather
//! than stall the sender, mirroring `InMemoryBus::publish` in the teacher
//! workspace's event-bus crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use vigil_types::{Correlation, SecurityEvent};

/// Everything the broadcaster can fan out.
///
/// The first two variants are produced by this crate's own pipeline; the
/// remaining three are accepted verbatim from out-of-scope collaborators
/// (the compliance scheduler, notification transports, threat-intel feeds)
/// so they can share one delivery path, per the external-interfaces section
/// of the spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// A newly classified (and possibly correlation-enriched) security event.
    SecurityEvent(Box<SecurityEvent>),
    /// A newly emitted correlation.
    CorrelationAlert(Box<Correlation>),
    /// Opaque scan-progress payload from an external scanner.
    ScanProgress(Value),
    /// Opaque system-metrics payload.
    SystemMetrics(Value),
    /// Opaque threat-intel feed status payload.
    ThreatIntelStatus(Value),
}

/// Delivery policy applied when a subscriber cannot keep up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressurePolicy {
    /// Best-effort, always non-blocking: slow subscribers silently miss
    /// messages (the default, matching `immediate_broadcast = true`).
    DropOnLag,
    /// Same delivery semantics as `DropOnLag`; kept as a distinct variant so
    /// callers can express the `immediate_broadcast = false` configuration
    /// option without the broadcaster itself ever blocking the pipeline,
    /// per spec's open-question resolution on immediate_broadcast.
    SkipOnLag,
}

/// Errors raised by broadcaster operations.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// No subscribers were attached to receive the message (informational,
    /// not a failure of the send itself).
    #[error("no active subscribers")]
    NoSubscribers,
}

/// Fan-out publish/subscribe interface for pipeline outputs.
pub trait Broadcaster: Send + Sync {
    /// Publish `message` to all current subscribers. Never blocks: a full
    /// or absent subscriber is handled per [`BackpressurePolicy`] and never
    /// causes this call to wait.
    fn publish(&self, message: BroadcastMessage);

    /// Subscribe to the live stream. Per-subscriber order preserves
    /// producer order; there is no ordering guarantee across subscribers.
    fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage>;

    /// Current number of attached subscribers.
    fn subscriber_count(&self) -> usize;
}

/// In-memory, best-effort broadcaster over a [`tokio::sync::broadcast`]
/// channel.
#[derive(Debug, Clone)]
pub struct InMemoryBroadcaster {
    tx: std::sync::Arc<broadcast::Sender<BroadcastMessage>>,
    policy: BackpressurePolicy,
}

impl InMemoryBroadcaster {
    /// Create a broadcaster with the given ring-buffer `capacity` and
    /// [`BackpressurePolicy`].
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx: std::sync::Arc::new(tx),
            policy,
        }
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new(1024, BackpressurePolicy::DropOnLag)
    }
}

impl Broadcaster for InMemoryBroadcaster {
    fn publish(&self, message: BroadcastMessage) {
        // Policy is recorded for observability/config purposes; both
        // variants resolve to the same non-blocking send — the broadcast
        // channel itself never blocks a producer on a lagging receiver.
        let _ = self.policy;
        match self.tx.send(message) {
            Ok(_delivered_to) => {}
            Err(broadcast::error::SendError(_)) => {
                tracing::debug!("broadcast with no active subscribers");
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
