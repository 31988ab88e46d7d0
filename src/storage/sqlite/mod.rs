//! Shared `SQLite` infrastructure.
//!
//! - `connection`: lock acquisition and connection configuration
//! - `metrics`: per-operation metrics helpers

mod connection;
mod metrics;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection, open_file};
pub use metrics::record_operation_metrics;
