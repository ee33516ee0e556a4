//! Notifications emitted by the stream client

use std::io;
use std::time::Duration;

use crate::protocol::{CodecError, Frame};

/// Connection state of a stream client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Not connected; waiting to (re)connect
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connected and receiving
    Connected,
    /// `stop()` was called; no further attempts
    Stopped,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal client-side failure, delivered as an event
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection attempt did not complete in time
    #[error("connection to {addr} timed out after {timeout:?} - is the server running?")]
    ConnectionTimeout { addr: String, timeout: Duration },

    /// Nothing is listening at the target address
    #[error("connection refused by {addr} - is the server running?")]
    ConnectionRefused { addr: String },

    /// Any other connection failure (DNS, unreachable network, ...)
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A received segment was not a valid frame
    #[error("malformed frame {raw:?}: {source}")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// A segment grew past the configured limit without a delimiter
    #[error("frame exceeds {limit} bytes without a delimiter ({size} buffered)")]
    FrameTooLarge { size: usize, limit: usize },

    /// The socket failed while reading
    #[error("receive error from {addr}: {source}")]
    Read {
        addr: String,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    /// Stable name of the error category
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::ConnectionTimeout { .. } => "ConnectionTimeout",
            ClientError::ConnectionRefused { .. } => "ConnectionRefused",
            ClientError::Connect { .. } => "ConnectError",
            ClientError::Decode { .. } => "DecodeError",
            ClientError::FrameTooLarge { .. } => "FrameTooLarge",
            ClientError::Read { .. } => "ReadError",
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decode { raw, source } => ClientError::Decode { raw, source },
            CodecError::FrameTooLarge { size, limit } => ClientError::FrameTooLarge { size, limit },
        }
    }
}

/// Everything a consumer can observe from a running client
#[derive(Debug)]
pub enum ClientEvent {
    /// A frame was received and decoded
    FrameReceived(Frame),

    /// The connection state changed (`Connecting`, `Connected` or `Disconnected`)
    StatusChanged(ConnectionStatus),

    /// A non-fatal error occurred
    Error(ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionStatus::Stopped.as_str(), "Stopped");
    }

    #[test]
    fn test_error_kinds_carry_address() {
        let timeout = ClientError::ConnectionTimeout {
            addr: "localhost:9999".into(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(timeout.kind(), "ConnectionTimeout");
        assert!(timeout.to_string().contains("localhost:9999"));

        let refused = ClientError::ConnectionRefused {
            addr: "localhost:9999".into(),
        };
        assert_eq!(refused.kind(), "ConnectionRefused");
        assert!(refused.to_string().contains("localhost:9999"));
    }

    #[test]
    fn test_from_codec_error() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: ClientError = CodecError::Decode {
            raw: "{bad".into(),
            source,
        }
        .into();

        match err {
            ClientError::Decode { ref raw, .. } => assert_eq!(raw, "{bad"),
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.kind(), "DecodeError");

        let err: ClientError = CodecError::FrameTooLarge { size: 10, limit: 8 }.into();
        assert_eq!(err.kind(), "FrameTooLarge");
    }
}
