//! Runtime statistics

pub mod metrics;

pub use metrics::{ClientMetrics, ClientStats, ServerMetrics, ServerStats};
