//! Per-channel bookmark-save coalescing.
//!
//! Successful commits update an in-memory cursor immediately so the channel
//! never re-reads a position it has already processed; the durable write is
//! coalesced to at most one flush per configured interval, except at
//! shutdown where a flush is always forced through.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use vigil_store_core::BookmarkStore;
use vigil_types::EventBookmark;

use crate::types::WatchError;

struct State {
    pending: Option<EventBookmark>,
    last_flushed_at: Option<Instant>,
}

/// Coalesces bookmark saves for a single channel.
pub struct BookmarkCoalescer<B: BookmarkStore> {
    store: std::sync::Arc<B>,
    interval: Duration,
    state: Mutex<State>,
}

impl<B: BookmarkStore> BookmarkCoalescer<B> {
    /// Construct a coalescer over `store`, flushing at most once per
    /// `interval`.
    pub fn new(store: std::sync::Arc<B>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            state: Mutex::new(State { pending: None, last_flushed_at: None }),
        }
    }

    /// Record that `bookmark` is the latest successfully committed
    /// position, flushing to the store if the coalescing interval has
    /// elapsed since the last flush.
    pub async fn advance(&self, bookmark: EventBookmark) -> Result<(), WatchError> {
        let mut state = self.state.lock().await;
        state.pending = Some(bookmark);
        let due = state
            .last_flushed_at
            .map(|at| at.elapsed() >= self.interval)
            .unwrap_or(true);
        if due {
            self.flush_locked(&mut state).await?;
        }
        Ok(())
    }

    /// Force a flush of the latest pending bookmark, regardless of the
    /// coalescing interval. Always called at shutdown.
    pub async fn flush(&self) -> Result<(), WatchError> {
        let mut state = self.state.lock().await;
        self.flush_locked(&mut state).await
    }

    async fn flush_locked(&self, state: &mut State) -> Result<(), WatchError> {
        if let Some(bookmark) = state.pending.take() {
            self.store.save(&bookmark).await?;
            state.last_flushed_at = Some(Instant::now());
        }
        Ok(())
    }
}
