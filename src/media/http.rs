//! HTTP size probe.

use super::{SizeProbe, bytes_to_mb};
use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Probes video size with HTTP headers only.
///
/// Sends `HEAD` first. When that yields no usable `Content-Length`, sends a
/// one-byte ranged `GET` and reads the total from `Content-Range`. The body is
/// never downloaded.
pub struct HttpSizeProbe {
    client: Client,
}

impl HttpSizeProbe {
    /// Creates a probe whose requests time out after `timeout_ms`.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        let mut builder = Client::builder();
        if timeout_ms > 0 {
            builder = builder
                .timeout(Duration::from_millis(timeout_ms))
                .connect_timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().unwrap_or_else(|err| {
            tracing::warn!("Failed to build size probe HTTP client: {err}");
            Client::new()
        });
        Self { client }
    }

    /// Creates a probe around an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn head(&self, url: &str) -> Result<Option<u64>> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| probe_error("head", &e))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(content_length(&response))
    }

    fn ranged_get(&self, url: &str) -> Result<Option<u64>> {
        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .map_err(|e| probe_error("ranged_get", &e))?;

        let status = response.status();
        if status == StatusCode::PARTIAL_CONTENT {
            return Ok(response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total));
        }
        if status.is_success() {
            return Ok(content_length(&response));
        }

        Err(Error::OperationFailed {
            operation: "probe_video_size".to_string(),
            cause: format!("{url} returned status {status}"),
        })
    }
}

impl SizeProbe for HttpSizeProbe {
    #[instrument(skip(self), fields(operation = "probe_video_size"))]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn probe_size_mb(&self, url: &str) -> Result<Option<f64>> {
        let start = Instant::now();
        let bytes = match self.head(url)? {
            Some(bytes) => Some(bytes),
            None => self.ranged_get(url)?,
        };

        metrics::histogram!("media_probe_duration_ms").record(start.elapsed().as_millis() as f64);

        Ok(bytes.filter(|&b| b > 0).map(bytes_to_mb))
    }
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&len| len > 0)
}

/// Extracts the total size from `Content-Range: bytes 0-0/12345`.
///
/// Returns `None` for an unknown total (`*`).
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

fn probe_error(step: &str, e: &reqwest::Error) -> Error {
    Error::OperationFailed {
        operation: format!("probe_video_size_{step}"),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("bytes 0-0/157286400" => Some(157_286_400) ; "known total")]
    #[test_case("bytes 0-0/*" => None ; "unknown total")]
    #[test_case(" bytes 0-0/42 " => Some(42) ; "surrounding whitespace")]
    #[test_case("garbage" => None ; "no slash")]
    fn test_parse_content_range_total(value: &str) -> Option<u64> {
        parse_content_range_total(value)
    }

    #[test]
    fn test_unreachable_host_is_error() {
        let probe = HttpSizeProbe::new(500);
        assert!(probe.probe_size_mb("http://127.0.0.1:1/video.mp4").is_err());
    }
}
