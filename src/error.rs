//! Error types
//!
//! `Error` covers failures that are returned to the caller of the producer
//! API. Faults caused by peers never surface here: the server logs them and
//! the client reports them as [`ClientError`](crate::client::ClientError)
//! events.

use std::io;

use crate::protocol::EncodeError;

/// Error returned by the producer-facing API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listening socket could not be acquired
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The value handed to `publish` is not a JSON object or failed to serialize
    #[error("failed to encode frame: {0}")]
    Encode(#[from] EncodeError),

    /// Other socket-level failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias using this crate's `Error`
pub type Result<T> = std::result::Result<T, Error>;
