//! Stream client implementation
//!
//! Subscribes to a broadcast server and turns its byte stream back into
//! frames:
//! - Reconnects with a fixed backoff whenever the connection drops
//! - Reports frames, status changes and errors as [`ClientEvent`]s

pub mod config;
pub mod event;
mod session;
pub mod subscriber;

pub use config::ClientConfig;
pub use event::{ClientError, ClientEvent, ConnectionStatus};
pub use subscriber::StreamClient;
