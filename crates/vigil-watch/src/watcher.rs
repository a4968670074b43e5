//! The per-channel watcher itself (component C).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vigil_store_core::{BookmarkStore, RuleStore};
use vigil_types::{EventBookmark, LogEvent};

use crate::bookmark_coalescer::BookmarkCoalescer;
use crate::dead_letter::{DeadLetterEntry, DeadLetterSink, DEAD_LETTER_THRESHOLD};
use crate::queue::DropOldestQueue;
use crate::sink::RecordSink;
use crate::source::ChannelSource;
use crate::types::{BookmarkPersistence, ChannelConfig, SourceRecord, WatchError, WatcherConfig};
use vigil_normalize::Normalizer;

/// Drives a single channel end to end: subscribe, buffer, normalize, commit,
/// bookmark.
pub struct ChannelWatcher<B: BookmarkStore, R: RuleStore> {
    config: ChannelConfig,
    global: Arc<WatcherConfig>,
    source: Arc<dyn ChannelSource>,
    normalizer: Arc<Normalizer<R>>,
    sink: Arc<dyn RecordSink>,
    bookmark_store: Arc<B>,
    bookmarks: BookmarkCoalescer<B>,
    queue: DropOldestQueue<(u64, SourceRecord)>,
    dead_letter: Arc<dyn DeadLetterSink>,
    failures: DashMap<String, u32>,
    last_commit_millis: AtomicI64,
    /// Lowest in-flight source sequence number not yet advanced past.
    next_advance: AtomicU64,
    /// Resolved tokens for sequence numbers ahead of `next_advance`, held
    /// until the gap closes. A record whose processing failed (and hasn't
    /// been dead-lettered and resolved) never gets an entry here, so the
    /// frontier sticks at its sequence number until it resolves — this is
    /// what actually enforces dead_letter's "blocks the bookmark" contract
    /// even with `consumer_concurrency` workers racing each other.
    pending_tokens: Mutex<BTreeMap<u64, Vec<u8>>>,
}

/// A point-in-time snapshot of one channel's runtime state, for the host
/// process to log or export (teacher pattern: `toka-runtime` logs queue and
/// persistence-task state at `debug`/`info`).
#[derive(Debug, Clone, Copy)]
pub struct WatcherStats {
    /// Records dropped so far due to backpressure.
    pub dropped_records: u64,
    /// Entries currently buffered between producer and workers.
    pub queue_depth: usize,
    /// Time of the last successful commit, if any.
    pub last_commit_time: Option<DateTime<Utc>>,
}

impl<B: BookmarkStore + 'static, R: RuleStore + 'static> ChannelWatcher<B, R> {
    /// Construct a watcher for `config`, sharing `global` tunables and the
    /// given backends.
    pub fn new(
        config: ChannelConfig,
        global: Arc<WatcherConfig>,
        source: Arc<dyn ChannelSource>,
        normalizer: Arc<Normalizer<R>>,
        sink: Arc<dyn RecordSink>,
        bookmark_store: Arc<B>,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let capacity = config.max_queue.unwrap_or(global.default_max_queue);
        let bookmarks = BookmarkCoalescer::new(bookmark_store.clone(), global.bookmark_coalesce_interval);
        Self {
            config,
            global,
            source,
            normalizer,
            sink,
            bookmark_store,
            bookmarks,
            queue: DropOldestQueue::new(capacity),
            dead_letter,
            failures: DashMap::new(),
            last_commit_millis: AtomicI64::new(0),
            next_advance: AtomicU64::new(0),
            pending_tokens: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of records dropped by backpressure so far.
    pub fn dropped_records(&self) -> u64 {
        self.queue.dropped()
    }

    /// Snapshot of this channel's current queue depth, drop count, and last
    /// commit time.
    pub async fn stats(&self) -> WatcherStats {
        let millis = self.last_commit_millis.load(Ordering::Relaxed);
        WatcherStats {
            dropped_records: self.queue.dropped(),
            queue_depth: self.queue.len().await,
            last_commit_time: (millis != 0)
                .then(|| DateTime::from_timestamp_millis(millis))
                .flatten(),
        }
    }

    /// Run this channel until `token` is cancelled, then drain in-flight
    /// work, flush the bookmark, and return.
    pub async fn run(self: Arc<Self>, token: CancellationToken) -> Result<(), WatchError> {
        if !self.config.enabled {
            return Ok(());
        }

        let existing = match self.config.bookmark_persistence {
            BookmarkPersistence::Database => self.bookmark_store.load(&self.config.name).await?,
            BookmarkPersistence::None => None,
        };

        let mut stream = self
            .source
            .subscribe(&self.config.name, self.config.xpath_filter.as_deref(), existing.as_ref())
            .await?;

        let producer = {
            let queue = self.queue.clone();
            let channel = self.config.name.clone();
            let producer_token = token.clone();
            tokio::spawn(async move {
                let mut seq: u64 = 0;
                loop {
                    tokio::select! {
                        _ = producer_token.cancelled() => break,
                        next = stream.next() => {
                            match next {
                                Some(record) => {
                                    queue.push((seq, record)).await;
                                    seq += 1;
                                }
                                None => {
                                    warn!(channel = %channel, "channel source stream ended");
                                    break;
                                }
                            }
                        }
                    }
                }
            })
        };

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.global.consumer_concurrency);
        for _ in 0..self.global.consumer_concurrency.max(1) {
            let this = self.clone();
            workers.push(tokio::spawn(async move { this.consume_loop().await }));
        }

        token.cancelled().await;
        self.queue.close();
        producer.abort();
        for worker in workers {
            let _ = worker.await;
        }
        self.bookmarks.flush().await?;
        info!(channel = %self.config.name, "channel watcher stopped");
        Ok(())
    }

    async fn consume_loop(&self) {
        while let Some((seq, record)) = self.queue.pop().await {
            match self.process_one(record).await {
                Ok(token) => {
                    if let Err(err) = self.complete(seq, token).await {
                        warn!(channel = %self.config.name, error = %err, "failed to advance bookmark");
                    }
                }
                Err(err) => {
                    warn!(channel = %self.config.name, error = %err, seq, "record processing failed, bookmark blocked at this position");
                }
            }
        }
    }

    /// Classify and commit `record`, returning the token the bookmark should
    /// advance to once this record's position is safe to pass. Does not
    /// itself touch the bookmark — a failing record (`Err`) must never move
    /// the frontier, and with multiple concurrent workers only [`Self::complete`]
    /// knows whether it's safe to do so yet.
    async fn process_one(&self, record: SourceRecord) -> Result<Vec<u8>, WatchError> {
        let unique_id = LogEvent::unique_id_for(&record.raw);

        if self.dead_letter.is_resolved(&self.config.name, &unique_id).await {
            self.failures.remove(&unique_id);
            return Ok(record.token);
        }

        let log_event = LogEvent::from_raw(record.raw.clone());
        let result = self.normalizer.classify(log_event).await;

        let classified = match result {
            Ok(classified) => {
                self.failures.remove(&unique_id);
                classified
            }
            Err(err) => {
                let count = {
                    let mut entry = self.failures.entry(unique_id.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                if count >= DEAD_LETTER_THRESHOLD {
                    self.dead_letter
                        .record(DeadLetterEntry {
                            channel: self.config.name.clone(),
                            unique_id: unique_id.clone(),
                            raw: record.raw,
                            last_error: err.to_string(),
                        })
                        .await;
                }
                return Err(WatchError::NormalizationFailed(err.to_string()));
            }
        };

        if let Some(event) = classified {
            self.sink.commit(event).await?;
            self.last_commit_millis.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        }

        Ok(record.token)
    }

    /// Record that `seq` resolved to `token`, then advance the bookmark past
    /// every contiguous resolved sequence number starting at the current
    /// frontier. A gap (an in-flight or blocked lower sequence number) halts
    /// the drain, so out-of-order completions from concurrent workers never
    /// let the bookmark skip over an unresolved record.
    async fn complete(&self, seq: u64, token: Vec<u8>) -> Result<(), WatchError> {
        let mut pending = self.pending_tokens.lock().await;
        pending.insert(seq, token);
        loop {
            let next = self.next_advance.load(Ordering::Acquire);
            let Some(token) = pending.remove(&next) else {
                break;
            };
            self.advance_bookmark(token).await?;
            self.next_advance.fetch_add(1, Ordering::Release);
        }
        Ok(())
    }

    async fn advance_bookmark(&self, token: Vec<u8>) -> Result<(), WatchError> {
        if self.config.bookmark_persistence == BookmarkPersistence::Database {
            self.bookmarks
                .advance(EventBookmark::new(self.config.name.clone(), token))
                .await?;
        }
        Ok(())
    }
}
