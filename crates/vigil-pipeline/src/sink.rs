//! The real `RecordSink`: ignore-pattern suppression, event storage,
//! correlation, and broadcast.
//!
//! Ordering follows §2's data-flow line: a suppressed event never reaches
//! the event store or correlation engine at all. For events that pass,
//! correlation analysis (which may enrich the event in place) runs before
//! the event is committed, so the stored record already carries any
//! risk-level upgrade — see `DESIGN.md` for why this reading of §5's
//! commit-then-emit wording was chosen over a literal one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use vigil_bus::{BroadcastMessage, Broadcaster};
use vigil_correlate::CorrelationEngine;
use vigil_ignore::IgnoreEngine;
use vigil_store_core::{CorrelationStore, EventStore};
use vigil_types::SecurityEvent;
use vigil_watch::{RecordSink, WatchError};

use crate::retry::{retry_with_backoff, RetryConfig};

/// Everything downstream of normalization, wired per the spec's data-flow
/// line: ignore engine, correlation engine, event store, broadcaster.
pub struct PipelineSink<St>
where
    St: EventStore + CorrelationStore + Send + Sync + 'static,
{
    ignore: Arc<IgnoreEngine>,
    correlation: Arc<CorrelationEngine<St>>,
    events: Arc<St>,
    broadcaster: Arc<dyn Broadcaster>,
    retry: RetryConfig,
}

impl<St> PipelineSink<St>
where
    St: EventStore + CorrelationStore + Send + Sync + 'static,
{
    /// Wire a sink over the given collaborators, retrying transient store
    /// commits per `retry`.
    pub fn new(
        ignore: Arc<IgnoreEngine>,
        correlation: Arc<CorrelationEngine<St>>,
        events: Arc<St>,
        broadcaster: Arc<dyn Broadcaster>,
        retry: RetryConfig,
    ) -> Self {
        Self { ignore, correlation, events, broadcaster, retry }
    }
}

#[async_trait]
impl<St> RecordSink for PipelineSink<St>
where
    St: EventStore + CorrelationStore + Send + Sync + 'static,
{
    async fn commit(&self, event: SecurityEvent) -> Result<(), WatchError> {
        let decision = self.ignore.process(&event);
        if decision.suppress {
            debug!(
                event_id = %event.id,
                reasons = ?decision.reasons,
                "event suppressed by ignore-pattern engine"
            );
            return Ok(());
        }

        let mut event = event;
        let analysis = self.correlation.analyze(&mut event).await;
        if analysis.has_correlation {
            debug!(event_id = %event.id, explanation = %analysis.explanation, "correlation matched");
        }

        retry_with_backoff(&self.retry, || self.events.add(&event))
            .await
            .map_err(|e| WatchError::StorageUnavailable(e.to_string()))?;

        self.broadcaster.publish(BroadcastMessage::SecurityEvent(Box::new(event)));
        if let Some(correlation) = analysis.correlation {
            self.broadcaster
                .publish(BroadcastMessage::CorrelationAlert(Box::new(correlation)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_bus::InMemoryBroadcaster;
    use vigil_correlate::CorrelationEngineConfig;
    use vigil_ignore::IgnoreEngineConfig;
    use vigil_store_memory::MemoryStore;
    use vigil_types::{LogEvent, RiskLevel, SecurityEventType};

    fn sample_event(unique_id: &str) -> SecurityEvent {
        let raw = LogEvent {
            time: Utc::now(),
            host: "HOST-A".into(),
            channel: "Security".into(),
            event_id: 4624,
            level: "Information".into(),
            user: "alice".into(),
            message: "logon".into(),
            raw_json: "{}".into(),
            unique_id: unique_id.into(),
        };
        SecurityEvent::new_deterministic(
            raw,
            SecurityEventType::AuthenticationSuccess,
            RiskLevel::Medium,
            85,
            "logon".into(),
            Default::default(),
            vec![],
        )
    }

    #[tokio::test]
    async fn non_suppressed_event_is_stored_and_broadcast() {
        let store = Arc::new(MemoryStore::new());
        let sink = PipelineSink::new(
            Arc::new(IgnoreEngine::new(IgnoreEngineConfig::default())),
            Arc::new(CorrelationEngine::new(store.clone(), CorrelationEngineConfig::default())),
            store.clone(),
            Arc::new(InMemoryBroadcaster::default()),
            RetryConfig::default(),
        );
        sink.commit(sample_event("Security:HOST-A:1")).await.unwrap();
        assert_eq!(
            EventStore::count(&*store, &vigil_store_core::EventFilter::default()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn suppressed_event_never_reaches_the_store() {
        let store = Arc::new(MemoryStore::new());
        let mut ignore_config = IgnoreEngineConfig::default();
        ignore_config.filter_all_local_events = true;
        ignore_config.local_machines = ["HOST-A".to_string()].into_iter().collect();
        let sink = PipelineSink::new(
            Arc::new(IgnoreEngine::new(ignore_config)),
            Arc::new(CorrelationEngine::new(store.clone(), CorrelationEngineConfig::default())),
            store.clone(),
            Arc::new(InMemoryBroadcaster::default()),
            RetryConfig::default(),
        );
        sink.commit(sample_event("Security:HOST-A:1")).await.unwrap();
        assert_eq!(
            EventStore::count(&*store, &vigil_store_core::EventFilter::default()).await.unwrap(),
            0
        );
    }
}
