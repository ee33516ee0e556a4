//! Statistics for the broadcast server and stream client

use std::sync::atomic::{AtomicU64, Ordering};

/// Live server counters, updated lock-free from the accept loop and `publish`
#[derive(Debug, Default)]
pub struct ServerMetrics {
    connections_accepted: AtomicU64,
    connections_dropped: AtomicU64,
    frames_published: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ServerMetrics {
    pub fn on_accept(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one publish call
    pub fn on_publish(&self, message_len: usize, delivered: usize, dropped: usize) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add((message_len * delivered) as u64, Ordering::Relaxed);
        self.connections_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn snapshot(&self, active_connections: usize) -> ServerStats {
        ServerStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: active_connections as u64,
            connections_dropped: self.connections_dropped.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub connections_accepted: u64,
    /// Subscribers currently registered
    pub active_connections: u64,
    /// Subscribers evicted after a failed write
    pub connections_dropped: u64,
    /// Number of `publish` calls
    pub frames_published: u64,
    /// Bytes successfully written across all subscribers
    pub bytes_sent: u64,
}

/// Live client counters, updated from the session task
#[derive(Debug, Default)]
pub struct ClientMetrics {
    connection_attempts: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    decode_errors: AtomicU64,
}

impl ClientMetrics {
    pub fn on_connect_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_bytes(&self, len: usize) {
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn on_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Client-side statistics, accumulated across reconnects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Connection attempts, successful or not
    pub connection_attempts: u64,
    /// Frames decoded and delivered
    pub frames_received: u64,
    /// Raw bytes read from the socket
    pub bytes_received: u64,
    /// Segments that failed to decode
    pub decode_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_metrics_new() {
        let stats = ServerMetrics::default().snapshot(0);
        assert_eq!(stats, ServerStats::default());
    }

    #[test]
    fn test_server_metrics_publish() {
        let metrics = ServerMetrics::default();
        metrics.on_accept();
        metrics.on_accept();
        metrics.on_accept();

        // 24-byte message reaching two of three subscribers
        metrics.on_publish(24, 2, 1);
        metrics.on_publish(24, 2, 0);

        let stats = metrics.snapshot(2);
        assert_eq!(stats.connections_accepted, 3);
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.connections_dropped, 1);
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.bytes_sent, 96);
    }

    #[test]
    fn test_client_metrics() {
        let metrics = ClientMetrics::default();
        metrics.on_connect_attempt();
        metrics.on_bytes(100);
        metrics.on_bytes(28);
        metrics.on_frame();
        metrics.on_decode_error();

        let stats = metrics.snapshot();
        assert_eq!(stats.connection_attempts, 1);
        assert_eq!(stats.bytes_received, 128);
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.decode_errors, 1);
    }
}
