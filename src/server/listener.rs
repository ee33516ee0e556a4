//! Broadcast server listener
//!
//! Handles the TCP accept loop, per-connection supervisors and fan-out of
//! published frames.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{Error, Result};
use crate::protocol;
use crate::registry::{ConnectionRegistry, PublishReport, Subscriber};
use crate::server::config::ServerConfig;
use crate::signal::shutdown_requested;
use crate::stats::{ServerMetrics, ServerStats};

/// Pause after an accept failure caused by descriptor exhaustion
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One-to-many telemetry broadcast server
///
/// # Example
/// ```no_run
/// use serde_json::json;
/// use telemetry_stream::BroadcastServer;
///
/// # async fn example() -> telemetry_stream::Result<()> {
/// let server = BroadcastServer::bind("localhost", 9999).await?;
///
/// let report = server.publish(&json!({"lap": 1, "speed": 301.4})).await?;
/// println!("delivered to {} subscribers", report.delivered);
///
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct BroadcastServer {
    config: ServerConfig,
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<ServerMetrics>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    stopped: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastServer {
    /// Bind to `host:port` with default settings and start accepting
    pub async fn bind(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::start(ServerConfig::new(host, port)).await
    }

    /// Bind the listening socket and spawn the accept loop
    ///
    /// Returns as soon as the socket is listening.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| Error::Bind {
                addr: config.display_addr(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(addr = %local_addr, "Telemetry stream server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Arc::new(ConnectionRegistry::new());
        let metrics = Arc::new(ServerMetrics::default());
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));

        let acceptor = Acceptor {
            listener,
            tcp_nodelay: config.tcp_nodelay,
            registry: Arc::clone(&registry),
            metrics: Arc::clone(&metrics),
            running: Arc::clone(&running),
            failed: Arc::clone(&failed),
            shutdown: shutdown_rx,
        };
        let accept_task = tokio::spawn(acceptor.run());

        Ok(Self {
            config,
            local_addr,
            registry,
            metrics,
            running,
            failed,
            stopped: AtomicBool::new(false),
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Encode `frame` once and write it to every registered subscriber
    ///
    /// Subscribers whose write fails are evicted. Peer failures never turn
    /// into an `Err`; the only error is a value that does not encode to a
    /// JSON object, in which case nothing is written.
    pub async fn publish<T: Serialize + ?Sized>(&self, frame: &T) -> Result<PublishReport> {
        let message = protocol::encode(frame)?;
        let report = self
            .registry
            .broadcast(&message, self.config.write_timeout)
            .await;

        self.metrics
            .on_publish(message.len(), report.delivered, report.dropped);

        if report.dropped > 0 {
            tracing::debug!(
                delivered = report.delivered,
                dropped = report.dropped,
                "Publish completed with evictions"
            );
        }

        Ok(report)
    }

    /// Stop accepting, close every subscriber and release the socket
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let first = !self.stopped.swap(true, Ordering::AcqRel);
        self.running.store(false, Ordering::Release);
        self.shutdown_tx.send_replace(true);

        // The accept task drops the listener and joins every supervisor
        if let Some(handle) = self.accept_task.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Accept task ended abnormally");
            }
        }

        for subscriber in self.registry.drain().await {
            subscriber.close().await;
        }

        if first {
            tracing::info!(addr = %self.local_addr, "Telemetry stream server stopped");
        }
    }

    /// Address the server is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether the accept loop is still accepting connections
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the accept loop halted on an unrecoverable error
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Number of registered subscribers
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Get server statistics
    pub async fn stats(&self) -> ServerStats {
        self.metrics.snapshot(self.registry.len().await)
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        // Background tasks exit on their own once they see the signal
        self.shutdown_tx.send_replace(true);
    }
}

/// State owned by the accept loop task
struct Acceptor {
    listener: TcpListener,
    tcp_nodelay: bool,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<ServerMetrics>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
}

impl Acceptor {
    async fn run(self) {
        let mut supervisors = JoinSet::new();
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                Some(_) = supervisors.join_next(), if !supervisors.is_empty() => {}
                result = self.listener.accept() => match result {
                    Ok((socket, peer_addr)) => {
                        self.register(socket, peer_addr, &mut supervisors).await;
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        if is_resource_exhaustion(&e) {
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener failed, no longer accepting connections");
                        self.failed.store(true, Ordering::Release);
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::Release);
        drop(self.listener);

        // Supervisors exit on peer close or shutdown
        while supervisors.join_next().await.is_some() {}
    }

    async fn register(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        supervisors: &mut JoinSet<()>,
    ) {
        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let id = self.registry.next_id();
        let (reader, writer) = socket.into_split();
        let subscriber = Arc::new(Subscriber::new(id, peer_addr, writer));

        self.registry.add(Arc::clone(&subscriber)).await;
        self.metrics.on_accept();

        tracing::info!(connection_id = id, peer = %peer_addr, "Subscriber connected");

        supervisors.spawn(supervise(
            subscriber,
            reader,
            Arc::clone(&self.registry),
            self.shutdown.clone(),
        ));
    }
}

/// Wait for a subscriber to go away, then deregister it
///
/// The protocol is push-only, so anything the peer sends is discarded. The
/// task sleeps in `select!` until the peer hangs up, a publish closes the
/// connection, or the server shuts down.
async fn supervise(
    subscriber: Arc<Subscriber>,
    mut reader: OwnedReadHalf,
    registry: Arc<ConnectionRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = subscriber.id();
    let mut buf = [0u8; 512];

    let reason = loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break "server shutdown",
            _ = subscriber.closed() => break "closed by server",
            result = reader.read(&mut buf) => match result {
                Ok(0) => break "peer closed",
                Ok(n) => {
                    tracing::trace!(connection_id = id, bytes = n, "Discarding inbound data");
                }
                Err(e) => {
                    tracing::debug!(connection_id = id, error = %e, "Subscriber read error");
                    break "read error";
                }
            }
        }
    };

    if registry.remove(id).await.is_some() {
        tracing::info!(
            connection_id = id,
            peer = %subscriber.peer_addr(),
            reason = reason,
            "Subscriber disconnected"
        );
    }
    subscriber.close().await;
}

/// Accept errors that concern one connection rather than the listener
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || is_resource_exhaustion(e)
}

/// System-wide open file table is full
#[cfg(unix)]
const ENFILE: i32 = 23;

/// Per-process descriptor limit reached
#[cfg(unix)]
const EMFILE: i32 = 24;

/// Descriptor exhaustion; these errno values are shared by Linux, macOS
/// and the BSDs. Other platforms only get the kind-based checks.
#[cfg(unix)]
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(ENFILE) | Some(EMFILE))
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_e: &io::Error) -> bool {
    false
}
