#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vigil-watch** – Channel watcher (component C).
//!
//! Bookmarked per-channel subscriptions feeding a bounded, drop-oldest FIFO
//! drained by a worker pool that normalizes and commits each record,
//! coalescing bookmark saves and honoring cooperative shutdown via
//! `tokio_util::sync::CancellationToken`, generalizing the
//! `tokio::select!`-driven shutdown pattern `toka-orchestration-service`
//! uses for its HTTP server.

/// Supporting configuration and error types.
pub mod types;
/// The channel-source seam.
pub mod source;
/// The pipeline seam a committed record is handed to.
pub mod sink;
/// Bounded drop-oldest FIFO.
pub mod queue;
/// Per-channel bookmark-save coalescing.
pub mod bookmark_coalescer;
/// Poison-event dead-lettering.
pub mod dead_letter;
/// The watcher itself.
pub mod watcher;

pub use bookmark_coalescer::BookmarkCoalescer;
pub use dead_letter::{DeadLetterEntry, DeadLetterSink, NoopDeadLetterSink, DEAD_LETTER_THRESHOLD};
pub use queue::DropOldestQueue;
pub use sink::RecordSink;
pub use source::ChannelSource;
pub use types::{BookmarkPersistence, ChannelConfig, SourceRecord, WatchError, WatcherConfig};
pub use watcher::{ChannelWatcher, WatcherStats};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use std::collections::BTreeSet;
    use vigil_normalize::{Normalizer, RuleCache};
    use vigil_store_core::RuleStore;
    use vigil_store_memory::MemoryStore;
    use vigil_types::{EventBookmark, RawRecord, RiskLevel, SecurityEvent, SecurityEventRule, SecurityEventType};

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
        ) -> Result<BoxStream<'static, SourceRecord>, WatchError> {
            let records: Vec<SourceRecord> = self
                .records
                .iter()
                .enumerate()
                .map(|(i, raw)| SourceRecord { raw: raw.clone(), token: vec![i as u8] })
                .collect();
            Ok(Box::pin(stream::iter(records)))
        }
    }

    struct CountingSink {
        count: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink for CountingSink {
        async fn commit(&self, _event: SecurityEvent) -> Result<(), WatchError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn raw(id: &str, event_id: i64) -> RawRecord {
        RawRecord {
            id: id.into(),
            channel: "Security".into(),
            event_id,
            provider: "p".into(),
            level: "Information".into(),
            time: Utc::now(),
            host: "HOST-A".into(),
            user: "alice".into(),
            message: "m".into(),
            xml: "<e/>".into(),
        }
    }

    async fn seeded_rule_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let rule = SecurityEventRule {
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
        };
        RuleStore::insert(&*store, rule).await.unwrap();
        store
    }

    #[tokio::test]
    async fn end_to_end_commits_and_advances_bookmark() {
        let rule_store = seeded_rule_store().await;
        let bookmark_store = Arc::new(MemoryStore::new());
        let normalizer = Arc::new(Normalizer::new(Arc::new(RuleCache::new(rule_store))));
        let sink = Arc::new(CountingSink { count: AtomicUsize::new(0) });
        let source = Arc::new(FixedSource { records: vec![raw("1", 4624), raw("2", 4624)] });

        let config = ChannelConfig {
            name: "Security".into(),
            enabled: true,
            xpath_filter: None,
            bookmark_persistence: BookmarkPersistence::Database,
            max_queue: None,
        };
        let global = Arc::new(WatcherConfig::default());
        let watcher = Arc::new(ChannelWatcher::new(
            config,
            global,
            source,
            normalizer,
            sink.clone(),
            bookmark_store.clone(),
            Arc::new(NoopDeadLetterSink),
        ));

        let token = CancellationToken::new();
        let stats_handle = watcher.clone();
        let handle = tokio::spawn(watcher.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(sink.count.load(Ordering::SeqCst), 2);
        let saved = vigil_store_core::BookmarkStore::load(&*bookmark_store, "Security").await.unwrap();
        assert!(saved.is_some());

        let stats = stats_handle.stats().await;
        assert_eq!(stats.dropped_records, 0);
        assert!(stats.last_commit_time.is_some());
    }

    struct FlakySink {
        blocked_user: &'static str,
        committed: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink for FlakySink {
        async fn commit(&self, event: SecurityEvent) -> Result<(), WatchError> {
            if event.original.user == self.blocked_user {
                return Err(WatchError::CommitFailed("simulated downstream rejection".into()));
            }
            self.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_workers_never_advance_past_a_blocked_record() {
        // The first record's commit always fails; the two after it succeed.
        // With `consumer_concurrency` workers racing on the same queue, a
        // worker can easily finish record 1 or 2 before another worker
        // finishes retrying record 0 — the bookmark must still never move
        // past record 0's position while it's unresolved.
        let rule_store = seeded_rule_store().await;
        let bookmark_store = Arc::new(MemoryStore::new());
        let normalizer = Arc::new(Normalizer::new(Arc::new(RuleCache::new(rule_store))));
        let sink = Arc::new(FlakySink { blocked_user: "blocked", committed: AtomicUsize::new(0) });
        let mut blocked_record = raw("1", 4624);
        blocked_record.user = "blocked".into();
        let source = Arc::new(FixedSource {
            records: vec![blocked_record, raw("2", 4624), raw("3", 4624)],
        });

        let config = ChannelConfig {
            name: "Security".into(),
            enabled: true,
            xpath_filter: None,
            bookmark_persistence: BookmarkPersistence::Database,
            max_queue: None,
        };
        let watcher = Arc::new(ChannelWatcher::new(
            config,
            Arc::new(WatcherConfig::default()),
            source,
            normalizer,
            sink.clone(),
            bookmark_store.clone(),
            Arc::new(NoopDeadLetterSink),
        ));

        let token = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        // Records 2 and 3 commit fine; record 0 never does.
        assert_eq!(sink.committed.load(Ordering::SeqCst), 2);
        // The bookmark must never have advanced, since sequence 0 is still
        // unresolved: nothing was ever safe to persist.
        let saved = vigil_store_core::BookmarkStore::load(&*bookmark_store, "Security").await.unwrap();
        assert!(saved.is_none());
    }

    #[tokio::test]
    async fn disabled_channel_never_subscribes() {
        let rule_store = seeded_rule_store().await;
        let bookmark_store = Arc::new(MemoryStore::new());
        let normalizer = Arc::new(Normalizer::new(Arc::new(RuleCache::new(rule_store))));
        let sink = Arc::new(CountingSink { count: AtomicUsize::new(0) });
        let source = Arc::new(FixedSource { records: vec![raw("1", 4624)] });

        let config = ChannelConfig {
            name: "Security".into(),
            enabled: false,
            xpath_filter: None,
            bookmark_persistence: BookmarkPersistence::Database,
            max_queue: None,
        };
        let watcher = Arc::new(ChannelWatcher::new(
            config,
            Arc::new(WatcherConfig::default()),
            source,
            normalizer,
            sink.clone(),
            bookmark_store,
            Arc::new(NoopDeadLetterSink),
        ));
        watcher.run(CancellationToken::new()).await.unwrap();
        assert_eq!(sink.count.load(Ordering::SeqCst), 0);
    }
}
