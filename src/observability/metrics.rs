//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the recorder is installed.
    pub enabled: bool,
    /// Where the rendered snapshot is written on flush.
    pub snapshot_path: Option<PathBuf>,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    #[must_use]
    pub fn from_settings(settings: &MetricsSettings) -> Self {
        Self {
            enabled: settings.enabled,
            snapshot_path: settings.snapshot_path.clone(),
        }
    }
}

/// Handle to the installed recorder.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
    snapshot_path: Option<PathBuf>,
}

impl MetricsHandle {
    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus recorder as the global recorder.
///
/// Returns `None` when metrics are disabled; `metrics` macros are then no-ops.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })?;

    Ok(Some(MetricsHandle {
        prometheus,
        snapshot_path: config.snapshot_path.clone(),
    }))
}

/// Writes the snapshot file if one is configured.
pub fn flush(handle: &MetricsHandle) {
    let Some(path) = &handle.snapshot_path else {
        tracing::debug!("No metrics snapshot path configured, skipping flush");
        return;
    };

    match write_snapshot(path, &handle.render()) {
        Ok(()) => tracing::debug!(path = %path.display(), "Metrics snapshot written"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics snapshot"),
    }
}

fn write_snapshot(path: &Path, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_metrics_dir".to_string(),
            cause: e.to_string(),
        })?;
    }
    let mut payload = payload.to_string();
    if !payload.ends_with('\n') {
        payload.push('\n');
    }
    std::fs::write(path, payload).map_err(|e| Error::OperationFailed {
        operation: "write_metrics_snapshot".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}
