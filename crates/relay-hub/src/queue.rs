//! Bounded single-consumer queue with drop-oldest overflow.

use std::collections::VecDeque;

use parking_lot::Mutex;
use relay_core::Reading;
use tokio::sync::Notify;

/// Result of [`OutboundQueue::push`].
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued with room to spare.
    Queued,
    /// Queued after evicting the oldest entry.
    DroppedOldest(Reading),
    /// The queue is closed; the reading was discarded.
    Closed,
}

struct Inner {
    items: VecDeque<Reading>,
    closed: bool,
}

/// Per-client outbound queue.
///
/// Pushing never blocks. When the queue holds `capacity` readings, the oldest
/// one is evicted to make room, so a client that stops draining keeps only
/// the most recent `capacity` readings.
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// Create an empty queue. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue a reading, evicting the oldest if full.
    pub fn push(&self, reading: Reading) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let evicted = if inner.items.len() >= self.capacity {
                inner.items.pop_front()
            } else {
                None
            };
            inner.items.push_back(reading);
            evicted.map_or(PushOutcome::Queued, PushOutcome::DroppedOldest)
        };
        self.notify.notify_one();
        outcome
    }

    /// Take the next reading without waiting.
    pub fn try_pop(&self) -> Option<Reading> {
        self.inner.lock().items.pop_front()
    }

    /// Wait for the next reading. Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<Reading> {
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(reading) = inner.items.pop_front() {
                    return Some(reading);
                }
            }
            // notify_one stores a permit, so a push between the unlock and
            // this await is not lost.
            self.notify.notified().await;
        }
    }

    /// Close the queue and discard anything still queued.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.items.clear();
        }
        self.notify.notify_one();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Readings currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued readings.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
