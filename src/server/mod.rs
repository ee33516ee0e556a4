//! Broadcast server
//!
//! Accepts subscriber connections and pushes every published frame to all
//! of them.

pub mod config;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use listener::BroadcastServer;
