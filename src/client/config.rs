//! Client configuration

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::server::config::{format_addr, DEFAULT_HOST, DEFAULT_PORT};

/// Stream client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or IP address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Upper bound for a single connection attempt
    pub connect_timeout: Duration,

    /// Wait between losing the connection and the next attempt
    pub reconnect_delay: Duration,

    /// Size of each socket read
    pub read_buffer_size: usize,

    /// Largest segment accepted before a delimiter must appear
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY on the client socket
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            read_buffer_size: 4096,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given server
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set reconnect backoff delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set read chunk size (at least one byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// `host:port` for logs and error events
    pub fn display_addr(&self) -> String {
        format_addr(&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9999);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientConfig::new("10.0.0.5", 7000)
            .connect_timeout(Duration::from_millis(500))
            .reconnect_delay(Duration::from_millis(100))
            .read_buffer_size(1024)
            .max_frame_size(64 * 1024)
            .tcp_nodelay(false);

        assert_eq!(config.display_addr(), "10.0.0.5:7000");
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.reconnect_delay, Duration::from_millis(100));
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.max_frame_size, 64 * 1024);
        assert!(!config.tcp_nodelay);
    }

    #[test]
    fn test_read_buffer_size_never_zero() {
        // A zero-length read buffer would look like end of stream
        let config = ClientConfig::default().read_buffer_size(0);

        assert_eq!(config.read_buffer_size, 1);
    }
}
