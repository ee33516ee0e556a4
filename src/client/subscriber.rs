//! Auto-reconnecting stream client
//!
//! High-level API for consuming a telemetry stream.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::stats::{ClientMetrics, ClientStats};

use super::config::ClientConfig;
use super::event::{ClientEvent, ConnectionStatus};
use super::session::Session;

/// Telemetry stream subscriber
///
/// Connects to a [`BroadcastServer`](crate::BroadcastServer), reconnects
/// whenever the connection is lost, and reports frames, status changes and
/// errors through an unbounded event channel so the receive loop never waits
/// on the consumer.
///
/// # Example
/// ```no_run
/// use telemetry_stream::client::{ClientConfig, ClientEvent, StreamClient};
///
/// # async fn example() {
/// let (mut client, mut events) = StreamClient::new(ClientConfig::new("localhost", 9999));
/// client.start();
///
/// while let Some(event) = events.recv().await {
///     match event {
///         ClientEvent::FrameReceived(frame) => println!("frame: {:?}", frame),
///         ClientEvent::StatusChanged(status) => println!("status: {}", status),
///         ClientEvent::Error(err) => eprintln!("{}: {}", err.kind(), err),
///     }
/// }
/// # }
/// ```
pub struct StreamClient {
    config: ClientConfig,
    events: mpsc::UnboundedSender<ClientEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    metrics: Arc<ClientMetrics>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Create a new client.
    ///
    /// Returns the client and a receiver for events. Nothing happens until
    /// [`start`](Self::start) is called.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);

        let client = Self {
            config,
            events: tx,
            status: Arc::new(status),
            metrics: Arc::new(ClientMetrics::default()),
            shutdown: None,
            task: None,
        };

        (client, rx)
    }

    /// Spawn the session task and return immediately.
    ///
    /// Must be called from within a tokio runtime. Calling `start` on a
    /// running client does nothing.
    pub fn start(&mut self) {
        if self.task.is_some() {
            tracing::debug!(addr = %self.config.display_addr(), "Client already started");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = Session::new(
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.status),
            Arc::clone(&self.metrics),
            shutdown_rx,
        );

        tracing::debug!(addr = %self.config.display_addr(), "Starting stream client");

        self.task = Some(tokio::spawn(session.run()));
        self.shutdown = Some(shutdown_tx);
    }

    /// Stop the session and wait for its task to exit.
    ///
    /// Interrupts any in-flight connect, read or backoff and closes the
    /// socket. Safe to call more than once.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send_replace(true);
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
            tracing::debug!(addr = %self.config.display_addr(), "Stream client stopped");
        }

        self.status.send_replace(ConnectionStatus::Stopped);
    }

    /// Current connection state
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Check if the session task is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get client statistics, accumulated across reconnects
    pub fn stats(&self) -> ClientStats {
        self.metrics.snapshot()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send_replace(true);
        }
    }
}
