//! Server configuration

use std::time::Duration;

/// Default host for both server and client
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port for both server and client
pub const DEFAULT_PORT: u16 = 9999;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP address to bind to
    pub host: String,

    /// Port to bind to (0 = OS-assigned)
    pub port: u16,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// A subscriber whose write takes longer than this is evicted
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tcp_nodelay: true, // Telemetry is latency sensitive
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Create a new config for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the bind host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable TCP_NODELAY on accepted sockets
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the per-subscriber write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// `host:port` for logs and errors, bracketing IPv6 literals
    pub fn display_addr(&self) -> String {
        format_addr(&self.host, self.port)
    }
}

pub(crate) fn format_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9999);
        assert!(config.tcp_nodelay);
        assert_eq!(config.write_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_new() {
        let config = ServerConfig::new("127.0.0.1", 9000);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ServerConfig::default()
            .host("0.0.0.0")
            .port(0)
            .tcp_nodelay(false)
            .write_timeout(Duration::from_millis(250));

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert!(!config.tcp_nodelay);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_display_addr() {
        assert_eq!(ServerConfig::default().display_addr(), "localhost:9999");
        assert_eq!(ServerConfig::new("::1", 9999).display_addr(), "[::1]:9999");
    }
}
