//! Attachment inspection.
//!
//! The media policy stage only needs one capability from here: how large a
//! remote video is.

mod http;

pub use http::HttpSizeProbe;

use crate::Result;

/// Bytes per megabyte used for size reporting.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Measures remote attachments.
pub trait SizeProbe: Send + Sync {
    /// Returns the size of the resource at `url` in megabytes.
    ///
    /// `Ok(None)` means the size could not be determined.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe itself fails (network error, timeout,
    /// non-success status).
    fn probe_size_mb(&self, url: &str) -> Result<Option<f64>>;
}

/// Converts a byte count to megabytes.
#[must_use]
#[allow(clippy::cast_precision_loss)] // sizes stay far below 2^52 bytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}
