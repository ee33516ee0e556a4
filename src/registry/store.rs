//! Connection registry implementation
//!
//! The only shared mutable state on the server side. Membership changes go
//! through one mutex; broadcasting works on a copied snapshot so a slow peer
//! never holds the lock while new subscribers register.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::entry::{ConnectionId, Subscriber};

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the message was written to
    pub delivered: usize,
    /// Subscribers evicted because the write failed
    pub dropped: usize,
}

/// Set of live subscriber connections keyed by connection ID
pub struct ConnectionRegistry {
    connections: Mutex<BTreeMap<ConnectionId, Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate an ID for a newly accepted connection
    pub fn next_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a subscriber
    pub async fn add(&self, subscriber: Arc<Subscriber>) {
        let mut connections = self.connections.lock().await;
        connections.insert(subscriber.id(), subscriber);
    }

    /// Deregister a subscriber, returning it if it was still present
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<Subscriber>> {
        self.connections.lock().await.remove(&id)
    }

    /// Copy of the current membership, in connection order
    pub async fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.connections.lock().await.values().cloned().collect()
    }

    /// Remove and return every subscriber
    pub async fn drain(&self) -> Vec<Arc<Subscriber>> {
        let mut connections = self.connections.lock().await;
        std::mem::take(&mut *connections).into_values().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Write an encoded message to every registered subscriber
    ///
    /// Writes run sequentially over a snapshot. Subscribers whose write fails
    /// are closed and deregistered once the pass is over.
    pub async fn broadcast(&self, message: &[u8], write_timeout: Duration) -> PublishReport {
        let subscribers = self.snapshot().await;
        let mut report = PublishReport::default();
        let mut dead = Vec::new();

        for subscriber in subscribers {
            match subscriber.send(message, write_timeout).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = subscriber.id(),
                        peer = %subscriber.peer_addr(),
                        error = %e,
                        "Write to subscriber failed"
                    );
                    dead.push(subscriber);
                }
            }
        }

        for subscriber in dead {
            subscriber.close().await;
            if self.remove(subscriber.id()).await.is_some() {
                tracing::info!(
                    connection_id = subscriber.id(),
                    peer = %subscriber.peer_addr(),
                    connected_secs = subscriber.duration().as_secs(),
                    "Subscriber evicted"
                );
            }
            report.dropped += 1;
        }

        report
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
