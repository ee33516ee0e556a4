//! Registered subscriber connection
//!
//! A `Subscriber` owns the write side of one accepted socket. The read side
//! stays with the per-connection supervisor task, which waits on
//! [`Subscriber::closed`] so a failed publish can wake it up.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

/// Server-assigned connection identifier
pub type ConnectionId = u64;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live subscriber in the registry
pub struct Subscriber {
    id: ConnectionId,
    peer_addr: SocketAddr,

    /// Single writer per connection keeps messages whole and in order
    writer: Mutex<BoxedWriter>,

    closed: Notify,
    is_closed: AtomicBool,
    connected_at: Instant,
    bytes_sent: AtomicU64,
}

impl Subscriber {
    /// Wrap the write side of an accepted connection
    pub fn new<W>(id: ConnectionId, peer_addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            peer_addr,
            writer: Mutex::new(Box::new(writer)),
            closed: Notify::new(),
            is_closed: AtomicBool::new(false),
            connected_at: Instant::now(),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Total bytes written to this subscriber
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    /// Write one complete wire message
    ///
    /// A write that does not finish within `write_timeout` counts as failed.
    pub async fn send(&self, message: &[u8], write_timeout: Duration) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ));
        }

        let mut writer = self.writer.lock().await;
        let write = async {
            writer.write_all(message).await?;
            writer.flush().await?;
            Ok::<_, io::Error>(())
        };

        match tokio::time::timeout(write_timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("write did not complete within {:?}", write_timeout),
                ))
            }
        }

        self.bytes_sent
            .fetch_add(message.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Close the write side and wake the supervisor. Idempotent.
    pub async fn close(&self) {
        if self.is_closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.closed.notify_one();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::trace!(connection_id = self.id, error = %e, "Shutdown after close failed");
        }
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.closed.notified().await;
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("is_closed", &self.is_closed())
            .field("bytes_sent", &self.bytes_sent())
            .finish()
    }
}
