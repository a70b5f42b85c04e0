//! Per-client state shared between the hub and the client's session task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use relay_core::{ConnectionId, Reading};
use tokio_util::sync::CancellationToken;

use crate::queue::{OutboundQueue, PushOutcome};

/// A registered client.
///
/// The hub pushes into the queue; the session drains it with
/// [`recv`](Self::recv). When the hub deregisters the handle the queue is
/// closed and [`closing`](Self::closing) is cancelled.
pub struct ClientHandle {
    id: ConnectionId,
    queue: OutboundQueue,
    /// Set on pong, cleared by each heartbeat check.
    is_alive: AtomicBool,
    closing: CancellationToken,
    dropped: AtomicU64,
}

impl ClientHandle {
    pub(crate) fn new(id: ConnectionId, queue_capacity: usize, closing: CancellationToken) -> Self {
        Self {
            id,
            queue: OutboundQueue::new(queue_capacity),
            is_alive: AtomicBool::new(true),
            closing,
            dropped: AtomicU64::new(0),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Next reading for this client; `None` once the handle is closed.
    pub async fn recv(&self) -> Option<Reading> {
        self.queue.pop().await
    }

    /// Next reading if one is queued.
    pub fn try_recv(&self) -> Option<Reading> {
        self.queue.try_pop()
    }

    /// Cancelled when the hub closes this handle.
    pub fn closing(&self) -> &CancellationToken {
        &self.closing
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Readings waiting to be written.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Readings evicted from this client's queue.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a pong (or any sign of life).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag. Returns `true` if the client showed
    /// life since the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Returns `true` if the oldest queued reading was evicted.
    pub(crate) fn enqueue(&self, reading: Reading) -> bool {
        match self.queue.push(reading) {
            PushOutcome::Queued | PushOutcome::Closed => false,
            PushOutcome::DroppedOldest(_) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    pub(crate) fn close(&self) {
        self.queue.close();
        self.closing.cancel();
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("queued", &self.queued())
            .field("dropped", &self.dropped_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn handle(capacity: usize) -> ClientHandle {
        ClientHandle::new(ConnectionId::from("conn_t"), capacity, CancellationToken::new())
    }

    #[test]
    fn enqueue_counts_evictions() {
        let h = handle(1);
        assert!(!h.enqueue(Reading::new(1, "a", Utc::now())));
        assert!(h.enqueue(Reading::new(2, "b", Utc::now())));
        assert_eq!(h.dropped_count(), 1);
        assert_eq!(h.try_recv().map(|r| r.seq), Some(2));
    }

    #[test]
    fn close_cancels_token_and_queue() {
        let h = handle(4);
        assert!(!h.enqueue(Reading::new(1, "a", Utc::now())));
        h.close();
        assert!(h.closing().is_cancelled());
        assert!(h.is_closed());
        assert_eq!(h.queued(), 0);
        assert!(!h.enqueue(Reading::new(2, "b", Utc::now())));
    }

    #[test]
    fn alive_flag_resets_on_check() {
        let h = handle(1);
        assert!(h.check_alive());
        assert!(!h.check_alive());
        h.mark_alive();
        assert!(h.check_alive());
    }

    #[test]
    fn debug_shows_id() {
        let h = handle(1);
        assert!(format!("{h:?}").contains("conn_t"));
    }
}
