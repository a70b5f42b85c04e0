//! The broadcast hub.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use relay_core::{ConnectionId, Reading};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::HubError;
use crate::handle::ClientHandle;

/// Hub limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Per-client queue capacity.
    pub queue_capacity: usize,
    /// Maximum concurrently registered clients.
    pub max_clients: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_clients: 256,
        }
    }
}

/// Outcome of one [`BroadcastHub::publish`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handles the reading was queued on.
    pub recipients: usize,
    /// Handles that had to evict their oldest reading.
    pub dropped: usize,
}

/// Counters for health reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Currently registered clients.
    pub connections: usize,
    /// Readings published since start.
    pub published: u64,
    /// Readings evicted from client queues since start.
    pub dropped: u64,
}

/// Registry of connected clients and the fan-out over it.
///
/// `publish` holds the read lock for the whole fan-out while `register` and
/// `deregister` take the write lock, so a reading published after `register`
/// returns reaches the new handle and none reaches a handle after
/// `deregister` returns.
pub struct BroadcastHub {
    clients: RwLock<HashMap<ConnectionId, Arc<ClientHandle>>>,
    config: HubConfig,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            config,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a client and return its handle.
    pub fn register(&self, id: ConnectionId) -> Result<Arc<ClientHandle>, HubError> {
        let mut clients = self.clients.write();
        if clients.len() >= self.config.max_clients && !clients.contains_key(&id) {
            return Err(HubError::CapacityReached {
                max: self.config.max_clients,
            });
        }
        match clients.entry(id) {
            Entry::Occupied(e) => Err(HubError::Duplicate(e.key().clone())),
            Entry::Vacant(e) => {
                let handle = Arc::new(ClientHandle::new(
                    e.key().clone(),
                    self.config.queue_capacity,
                    CancellationToken::new(),
                ));
                debug!(conn_id = %handle.id(), "client registered");
                let _ = e.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Remove a client and close its handle. Returns `false` if it was not
    /// registered.
    pub fn deregister(&self, id: &ConnectionId) -> bool {
        let removed = self.clients.write().remove(id);
        match removed {
            Some(handle) => {
                handle.close();
                debug!(conn_id = %id, dropped = handle.dropped_count(), "client deregistered");
                true
            }
            None => false,
        }
    }

    /// Queue a copy of `reading` on every registered handle.
    pub fn publish(&self, reading: &Reading) -> PublishReport {
        let clients = self.clients.read();
        let mut report = PublishReport::default();
        for handle in clients.values() {
            report.recipients += 1;
            if handle.enqueue(reading.clone()) {
                report.dropped += 1;
                debug!(conn_id = %handle.id(), seq = reading.seq, "client queue full, dropped oldest reading");
            }
        }
        drop(clients);

        let _ = self.published.fetch_add(1, Ordering::Relaxed);
        if report.dropped > 0 {
            let _ = self
                .dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
        report
    }

    /// Close and remove every handle.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.clients.write().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.close();
        }
        drained.len()
    }

    /// Number of registered clients.
    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Snapshot of the hub counters.
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connection_count(),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn reading(seq: u64, payload: &str) -> Reading {
        Reading::new(seq, payload, Utc::now())
    }

    fn hub(queue_capacity: usize, max_clients: usize) -> BroadcastHub {
        BroadcastHub::new(HubConfig {
            queue_capacity,
            max_clients,
        })
    }

    fn drain(handle: &ClientHandle) -> Vec<String> {
        std::iter::from_fn(|| handle.try_recv())
            .map(|r| r.payload().to_string())
            .collect()
    }

    #[test]
    fn register_and_count() {
        let hub = BroadcastHub::default();
        let _a = hub.register(ConnectionId::from("a")).unwrap();
        let _b = hub.register(ConnectionId::from("b")).unwrap();
        assert_eq!(hub.connection_count(), 2);
        assert_eq!(hub.stats().connections, 2);
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let hub = BroadcastHub::default();
        let _a = hub.register(ConnectionId::from("a")).unwrap();
        let err = hub.register(ConnectionId::from("a")).unwrap_err();
        assert_eq!(err, HubError::Duplicate(ConnectionId::from("a")));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let hub = hub(4, 1);
        let _a = hub.register(ConnectionId::from("a")).unwrap();
        assert_matches!(
            hub.register(ConnectionId::from("b")),
            Err(HubError::CapacityReached { max: 1 })
        );
        assert!(hub.deregister(&ConnectionId::from("a")));
        assert!(hub.register(ConnectionId::from("b")).is_ok());
    }

    #[test]
    fn publish_without_clients_is_a_no_op() {
        let hub = BroadcastHub::default();
        assert_eq!(hub.publish(&reading(1, "23.5")), PublishReport::default());
        assert_eq!(hub.publish(&reading(2, "24.1")), PublishReport::default());
        let stats = hub.stats();
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn every_client_receives_reading() {
        let hub = BroadcastHub::default();
        let a = hub.register(ConnectionId::from("a")).unwrap();
        let b = hub.register(ConnectionId::from("b")).unwrap();
        let report = hub.publish(&reading(1, "22.0"));
        assert_eq!(report.recipients, 2);
        assert_eq!(drain(&a), vec!["22.0"]);
        assert_eq!(drain(&b), vec!["22.0"]);
    }

    #[test]
    fn publish_reaches_only_current_handles() {
        let hub = BroadcastHub::default();
        let a = hub.register(ConnectionId::from("a")).unwrap();
        let _ = hub.publish(&reading(1, "1"));
        let b = hub.register(ConnectionId::from("b")).unwrap();
        let _ = hub.publish(&reading(2, "2"));
        assert!(hub.deregister(a.id()));
        let _ = hub.publish(&reading(3, "3"));

        assert!(drain(&a).is_empty(), "deregister clears the queue");
        assert_eq!(drain(&b), vec!["2", "3"]);
    }

    #[test]
    fn slow_client_keeps_last_k_and_others_unaffected() {
        let hub = hub(3, 8);
        let slow = hub.register(ConnectionId::from("slow")).unwrap();
        let fast = hub.register(ConnectionId::from("fast")).unwrap();

        let mut fast_seen = Vec::new();
        for i in 1..=10 {
            let _ = hub.publish(&reading(i, &i.to_string()));
            fast_seen.extend(drain(&fast));
        }

        assert_eq!(drain(&slow), vec!["8", "9", "10"]);
        assert_eq!(fast_seen.len(), 10);
        assert_eq!(slow.dropped_count(), 7);
        assert_eq!(fast.dropped_count(), 0);
        assert_eq!(hub.stats().dropped, 7);
    }

    #[test]
    fn double_deregister_is_a_no_op() {
        let hub = BroadcastHub::default();
        let a = hub.register(ConnectionId::from("a")).unwrap();
        assert!(hub.deregister(a.id()));
        assert!(!hub.deregister(a.id()));
        assert!(a.closing().is_cancelled());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn close_all_cancels_every_handle() {
        let hub = BroadcastHub::default();
        let a = hub.register(ConnectionId::from("a")).unwrap();
        let b = hub.register(ConnectionId::from("b")).unwrap();
        assert_eq!(hub.close_all(), 2);
        assert!(a.closing().is_cancelled());
        assert!(b.is_closed());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn stats_serialize_camel_case() {
        let json = serde_json::to_value(HubStats {
            connections: 1,
            published: 2,
            dropped: 3,
        })
        .unwrap();
        assert_eq!(json["connections"], 1);
        assert_eq!(json["published"], 2);
        assert_eq!(json["dropped"], 3);
    }

    #[tokio::test]
    async fn session_drains_in_order() {
        let hub = Arc::new(BroadcastHub::default());
        let handle = hub.register(ConnectionId::from("a")).unwrap();

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(r) = handle.recv().await {
                seen.push(r.seq);
            }
            seen
        });

        for i in 1..=5 {
            let _ = hub.publish(&reading(i, "x"));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(hub.deregister(&ConnectionId::from("a")));

        let seen = consumer.await.unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_and_publish() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            queue_capacity: 1024,
            max_clients: 64,
        }));

        let publisher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for i in 1..=500 {
                    let _ = hub.publish(&reading(i, "v"));
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut joins = Vec::new();
        for n in 0..16 {
            let hub = Arc::clone(&hub);
            joins.push(tokio::spawn(async move {
                let id = ConnectionId::from(format!("c{n}"));
                let handle = hub.register(id.clone()).unwrap();
                tokio::task::yield_now().await;
                let seqs: Vec<u64> = std::iter::from_fn(|| handle.try_recv()).map(|r| r.seq).collect();
                assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1), "gap in {seqs:?}");
                assert!(hub.deregister(&id));
            }));
        }

        for j in joins {
            j.await.unwrap();
        }
        publisher.await.unwrap();
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.stats().published, 500);
    }
}
