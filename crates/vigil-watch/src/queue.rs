//! Bounded, drop-oldest FIFO used to buffer records between a channel's
//! producer and its consumer pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: std::sync::atomic::AtomicBool,
}

/// A bounded FIFO that drops the oldest entry (and increments a counter)
/// instead of blocking the producer when full.
pub struct DropOldestQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DropOldestQueue<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Send + 'static> DropOldestQueue<T> {
    /// Construct a queue bounded at `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                notify: Notify::new(),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
                closed: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Push `item`, dropping the oldest entry first if the queue is full.
    pub async fn push(&self, item: T) {
        let mut items = self.inner.items.lock().await;
        if items.len() >= self.inner.capacity {
            items.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        items.push_back(item);
        drop(items);
        self.inner.notify.notify_one();
    }

    /// Pop the oldest entry, waiting until one is available or the queue is
    /// closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut items = self.inner.items.lock().await;
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
                if self.inner.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Mark the queue closed: once drained, `pop` returns `None` instead of
    /// waiting for more entries.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Number of entries dropped so far due to backpressure.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Current queue depth.
    pub async fn len(&self) -> usize {
        self.inner.items.lock().await.len()
    }
}
