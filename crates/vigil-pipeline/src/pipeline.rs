//! Top-level wiring: watcher(s) -> normalizer -> ignore engine -> event
//! store + correlation engine -> orchestrator / broadcaster.
//!
//! Structurally grounded on `toka_runtime::Runtime`: a single struct that
//! sequentially constructs its collaborators (bus, storage, kernel) and owns
//! whatever background tasks keep them running, generalized here to one
//! watcher task per channel plus a health-probe task, all cancelled through
//! one shared `CancellationToken` the way `toka-orchestration-service`
//! races its HTTP server against `shutdown_signal()`.

use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vigil_bus::{Broadcaster, InMemoryBroadcaster};
use vigil_correlate::CorrelationEngine;
use vigil_ignore::IgnoreEngine;
use vigil_normalize::{Normalizer, RuleCache};
use vigil_respond::{HandlerRegistry, ResponseOrchestrator};
use vigil_store_core::{ActionStore, BookmarkStore, CorrelationStore, EventStore, RuleStore};
use vigil_watch::{ChannelSource, ChannelWatcher};

use crate::config::PipelineConfig;
use crate::dead_letter::InMemoryDeadLetterStore;
use crate::health::{run_health_probe, HealthState, HealthStatus};
use crate::sink::PipelineSink;

/// Storage backend bound the pipeline needs: a single driver implementing
/// every persistence trait, mirroring `toka-store-memory`/`toka-store-sqlite`
/// each implementing the full `toka_store_core` trait set.
pub trait PipelineStore:
    EventStore + CorrelationStore + ActionStore + RuleStore + BookmarkStore + Send + Sync + 'static
{
}

impl<T> PipelineStore for T where
    T: EventStore + CorrelationStore + ActionStore + RuleStore + BookmarkStore + Send + Sync + 'static
{
}

/// A fully wired vigil pipeline: one watcher per configured channel, an
/// ignore engine, a correlation engine, a response orchestrator, a
/// broadcaster, and a background health probe, all sharing one store and one
/// cancellation token.
pub struct Pipeline<St: PipelineStore> {
    store: Arc<St>,
    correlation: Arc<CorrelationEngine<St>>,
    orchestrator: Arc<ResponseOrchestrator<St>>,
    broadcaster: Arc<dyn Broadcaster>,
    dead_letter: Arc<InMemoryDeadLetterStore>,
    health: Arc<HealthState>,
    config: PipelineConfig,
    token: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<St: PipelineStore> Pipeline<St> {
    /// Wire a pipeline over `store` and `source`, using `handlers` for the
    /// response orchestrator's action dispatch.
    pub fn new(
        config: PipelineConfig,
        store: Arc<St>,
        source: Arc<dyn ChannelSource>,
        handlers: Arc<HandlerRegistry>,
    ) -> Arc<Self> {
        let rule_cache = Arc::new(RuleCache::new(store.clone()));
        let normalizer = Arc::new(Normalizer::new(rule_cache));
        let ignore = Arc::new(IgnoreEngine::new(config.ignore.clone()));
        let correlation = Arc::new(CorrelationEngine::new(store.clone(), config.correlation.clone()));
        let orchestrator = Arc::new(ResponseOrchestrator::new(store.clone(), handlers, config.respond.clone()));
        let broadcaster: Arc<dyn Broadcaster> =
            Arc::new(InMemoryBroadcaster::new(config.broadcast_capacity, config.backpressure));
        let dead_letter = Arc::new(InMemoryDeadLetterStore::new());

        let sink = Arc::new(PipelineSink::new(
            ignore.clone(),
            correlation.clone(),
            store.clone(),
            broadcaster.clone(),
            config.retry,
        ));

        let token = CancellationToken::new();
        let global_watcher_config = Arc::new(config.watcher.clone());
        let mut tasks = Vec::with_capacity(config.channels.len() + 1);

        for channel in &config.channels {
            let watcher = Arc::new(ChannelWatcher::new(
                channel.clone(),
                global_watcher_config.clone(),
                source.clone(),
                normalizer.clone(),
                sink.clone(),
                store.clone(),
                dead_letter.clone(),
            ));
            let watcher_token = token.clone();
            let channel_name = channel.name.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = watcher.run(watcher_token).await {
                    tracing::error!(channel = %channel_name, error = %err, "channel watcher exited with error");
                }
            }));
        }

        let health = Arc::new(HealthState::default());
        let health_token = token.clone();
        let health_store = store.clone();
        let health_state = health.clone();
        let interval = config.health_check_interval;
        let timeout = config.health_check_timeout;
        tasks.push(tokio::spawn(async move {
            run_health_probe(health_store, health_state, interval, timeout, health_token).await
        }));

        Arc::new(Self {
            store,
            correlation,
            orchestrator,
            broadcaster,
            dead_letter,
            health,
            config,
            token,
            tasks: std::sync::Mutex::new(tasks),
        })
    }

    /// Block until either a shutdown signal (Ctrl+C / SIGTERM) arrives or
    /// the pipeline is cancelled programmatically via [`Pipeline::shutdown`],
    /// then drain every watcher and health task.
    pub async fn run_until_shutdown(self: Arc<Self>) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = shutdown_signal() => {
                info!("received shutdown signal");
                self.token.cancel();
            }
        }
        self.join().await;
    }

    /// Cancel the pipeline's token, causing every watcher to drain in-flight
    /// work, flush its bookmark, and the health probe to stop.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Await every background task. Idempotent only on first call; intended
    /// to be called once after [`Pipeline::shutdown`].
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("tasks mutex poisoned");
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// The shared event/correlation/action/rule/bookmark store.
    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// The correlation engine, for ad-hoc `analyze_batch`/`get_statistics`
    /// calls by the host process.
    pub fn correlation_engine(&self) -> &Arc<CorrelationEngine<St>> {
        &self.correlation
    }

    /// The response orchestrator, for `suggest`/`execute`/`rollback` calls
    /// from an admin surface outside the pipeline.
    pub fn orchestrator(&self) -> &Arc<ResponseOrchestrator<St>> {
        &self.orchestrator
    }

    /// The broadcaster, for external subscribers (admin UI, notification
    /// transports).
    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    /// The dead-letter store, for an operator surface to list and resolve
    /// poisoned records.
    pub fn dead_letter_store(&self) -> &Arc<InMemoryDeadLetterStore> {
        &self.dead_letter
    }

    /// Current store health as observed by the background probe.
    pub fn health_status(&self) -> HealthStatus {
        self.health.status()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use futures::stream::{self, BoxStream};
    use std::collections::BTreeSet;
    use std::time::Duration;
    use vigil_store_core::{EventFilter, RuleStore};
    use vigil_store_memory::MemoryStore;
    use vigil_types::{EventBookmark, RawRecord, RiskLevel, SecurityEventRule, SecurityEventType};
    use vigil_watch::{BookmarkPersistence, ChannelConfig, WatchError, WatcherConfig};

    struct FixedSource {
        records: Vec<RawRecord>,
    }

    #[async_trait]
    impl ChannelSource for FixedSource {
        async fn subscribe(
            &self,
            _channel: &str,
            _xpath_filter: Option<&str>,
            _after: Option<&EventBookmark>,
        ) -> Result<BoxStream<'static, vigil_watch::SourceRecord>, WatchError> {
            let records: Vec<vigil_watch::SourceRecord> = self
                .records
                .iter()
                .enumerate()
                .map(|(i, raw)| vigil_watch::SourceRecord { raw: raw.clone(), token: vec![i as u8] })
                .collect();
            Ok(Box::pin(stream::iter(records)))
        }
    }

    fn failure_record(id: &str, seconds_offset: i64, now: chrono::DateTime<Utc>) -> RawRecord {
        RawRecord {
            id: id.into(),
            channel: "Security".into(),
            event_id: 4625,
            provider: "p".into(),
            level: "Warning".into(),
            time: now + ChronoDuration::seconds(seconds_offset),
            host: "HOST-A".into(),
            user: "alice".into(),
            message: "An account failed to log on.".into(),
            xml: "<e/>".into(),
        }
    }

    fn success_record(id: &str, seconds_offset: i64, now: chrono::DateTime<Utc>) -> RawRecord {
        RawRecord {
            id: id.into(),
            channel: "Security".into(),
            event_id: 4624,
            provider: "p".into(),
            level: "Information".into(),
            time: now + ChronoDuration::seconds(seconds_offset),
            host: "HOST-A".into(),
            user: "alice".into(),
            message: "An account was successfully logged on.".into(),
            xml: "<e/>".into(),
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        RuleStore::insert(
            &*store,
            SecurityEventRule {
                event_id: 4625,
                channel: "Security".into(),
                event_type: SecurityEventType::AuthenticationFailure,
                base_risk: RiskLevel::Medium,
                base_confidence: 70,
                summary_template: "{user} failed to log on to {host}".into(),
                mitre_techniques: BTreeSet::new(),
                recommended_actions: vec![],
                priority: 10,
                enabled: true,
            },
        )
        .await
        .unwrap();
        RuleStore::insert(
            &*store,
            SecurityEventRule {
                event_id: 4624,
                channel: "Security".into(),
                event_type: SecurityEventType::AuthenticationSuccess,
                base_risk: RiskLevel::Medium,
                base_confidence: 85,
                summary_template: "{user} logged on to {host}".into(),
                mitre_techniques: BTreeSet::from(["T1078".to_string()]),
                recommended_actions: vec![],
                priority: 10,
                enabled: true,
            },
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn brute_force_sequence_is_stored_with_enriched_risk() {
        let store = seeded_store().await;
        let now = Utc::now();
        let mut records: Vec<RawRecord> = (0..5)
            .map(|i| failure_record(&format!("f{i}"), i * 10, now))
            .collect();
        records.push(success_record("s0", 60, now));
        let source = Arc::new(FixedSource { records });

        let config = PipelineConfig {
            channels: vec![ChannelConfig {
                name: "Security".into(),
                enabled: true,
                xpath_filter: None,
                bookmark_persistence: BookmarkPersistence::Database,
                max_queue: None,
            }],
            watcher: WatcherConfig::default(),
            health_check_interval: Duration::from_secs(3600),
            ..PipelineConfig::default()
        };

        let handlers = Arc::new(HandlerRegistry::new());
        let pipeline = Pipeline::new(config, store.clone(), source, handlers);

        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.shutdown();
        pipeline.join().await;

        let events = EventStore::get(&*store, 0, 10, &EventFilter::default()).await.unwrap();
        let success = events
            .iter()
            .find(|e| e.event_type == SecurityEventType::AuthenticationSuccess)
            .expect("success event stored");
        assert_eq!(success.risk_level, RiskLevel::High);
        assert!(success.correlation_ids.as_ref().is_some_and(|ids| !ids.is_empty()));
    }
}
