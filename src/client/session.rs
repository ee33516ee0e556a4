//! Client session loop
//!
//! One task per started client runs connect → receive → backoff until
//! shutdown is signalled:
//!
//! ```text
//!   Disconnected ──start()──► Connecting ──ok──► Connected
//!        ▲                        │                  │
//!        │                     refused/           EOF/error
//!        │                     timeout               │
//!        └────── backoff ◄────────┴──────────────────┘
//!
//!   any state ──stop()──► Stopped
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use crate::protocol::{CodecError, FrameDecoder};
use crate::signal::{is_shutdown, shutdown_requested};
use crate::stats::ClientMetrics;

use super::config::ClientConfig;
use super::event::{ClientError, ClientEvent, ConnectionStatus};

/// State owned by the session task
pub(super) struct Session {
    config: ClientConfig,
    events: mpsc::UnboundedSender<ClientEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    metrics: Arc<ClientMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    pub(super) fn new(
        config: ClientConfig,
        events: mpsc::UnboundedSender<ClientEvent>,
        status: Arc<watch::Sender<ConnectionStatus>>,
        metrics: Arc<ClientMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            events,
            status,
            metrics,
            shutdown,
        }
    }

    /// Run until shutdown
    pub(super) async fn run(mut self) {
        let addr = self.config.display_addr();

        while !is_shutdown(&self.shutdown) {
            self.set_status(ConnectionStatus::Connecting);
            self.metrics.on_connect_attempt();

            match self.connect().await {
                Some(Ok(stream)) => {
                    tracing::info!(addr = %addr, "Connected to telemetry stream");
                    self.set_status(ConnectionStatus::Connected);
                    self.receive(stream).await;
                }
                Some(Err(err)) => {
                    tracing::debug!(addr = %addr, error = %err, "Connection attempt failed");
                    self.emit(ClientEvent::Error(err));
                }
                None => break,
            }

            self.set_status(ConnectionStatus::Disconnected);

            if !self.backoff().await {
                break;
            }
        }

        self.status.send_replace(ConnectionStatus::Stopped);
        tracing::debug!(addr = %addr, "Session loop exited");
    }

    /// Open a connection, or `None` if shutdown interrupted the attempt
    async fn connect(&mut self) -> Option<Result<TcpStream, ClientError>> {
        let addr = self.config.display_addr();
        let timeout = self.config.connect_timeout;
        let attempt = tokio::time::timeout(
            timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        );

        let result = tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => return None,
            result = attempt => result,
        };

        Some(match result {
            Err(_) => Err(ClientError::ConnectionTimeout { addr, timeout }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(ClientError::ConnectionRefused { addr })
            }
            Ok(Err(source)) => Err(ClientError::Connect { addr, source }),
            Ok(Ok(stream)) => {
                if self.config.tcp_nodelay {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
                    }
                }
                Ok(stream)
            }
        })
    }

    /// Read and decode until the stream ends, fails, or shutdown
    ///
    /// The accumulation buffer lives only for this connection; partial data
    /// from a dropped connection is never spliced onto the next one.
    async fn receive<R>(&mut self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut decoder = FrameDecoder::with_max_frame_size(self.config.max_frame_size);
        let mut chunk = vec![0u8; self.config.read_buffer_size];

        loop {
            let read = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => return,
                read = reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    tracing::info!(
                        addr = %self.config.display_addr(),
                        discarded = decoder.buffered(),
                        "Server closed the stream"
                    );
                    return;
                }
                Ok(n) => {
                    self.metrics.on_bytes(n);
                    decoder.extend(&chunk[..n]);

                    while let Some(result) = decoder.decode_next() {
                        match result {
                            Ok(frame) => {
                                self.metrics.on_frame();
                                self.emit(ClientEvent::FrameReceived(frame));
                            }
                            Err(err @ CodecError::Decode { .. }) => {
                                self.metrics.on_decode_error();
                                tracing::warn!(error = %err, "Dropping malformed frame");
                                self.emit(ClientEvent::Error(err.into()));
                            }
                            Err(err @ CodecError::FrameTooLarge { .. }) => {
                                tracing::warn!(error = %err, "Dropping connection");
                                self.emit(ClientEvent::Error(err.into()));
                                return;
                            }
                        }
                    }
                }
                Err(source) => {
                    if !is_shutdown(&self.shutdown) {
                        let addr = self.config.display_addr();
                        tracing::warn!(addr = %addr, error = %source, "Receive error");
                        self.emit(ClientEvent::Error(ClientError::Read { addr, source }));
                    }
                    return;
                }
            }
        }
    }

    /// Sleep for the reconnect delay; `false` if shutdown cut it short
    async fn backoff(&mut self) -> bool {
        tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => false,
            _ = tokio::time::sleep(self.config.reconnect_delay) => true,
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
        self.emit(ClientEvent::StatusChanged(status));
    }

    /// Never blocks; a consumer that dropped its receiver is ignored
    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
