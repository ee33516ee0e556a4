//! One-to-many telemetry fan-out over TCP
//!
//! A single producer publishes JSON frames through a [`BroadcastServer`];
//! any number of [`StreamClient`]s receive an identical copy of the stream,
//! reconnecting on their own whenever the server goes away.
//!
//! ```text
//! producer ─► publish() ─► encode once ─┬─► socket ─► StreamClient ─► ClientEvent
//!                                       ├─► socket ─► StreamClient ─► ClientEvent
//!                                       └─► socket ✗ (evicted)
//! ```
//!
//! Delivery is best effort: a subscriber that is not connected misses the
//! frames published in the meantime.

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
mod signal;
pub mod stats;

pub use client::{ClientConfig, ClientError, ClientEvent, ConnectionStatus, StreamClient};
pub use error::{Error, Result};
pub use protocol::Frame;
pub use registry::PublishReport;
pub use server::{BroadcastServer, ServerConfig};
