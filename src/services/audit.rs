//! Skip audit log writer.

use crate::Result;
use crate::models::{PipelineStats, SkipEvent};
use crate::storage::HistoryStore;
use std::sync::Arc;

/// Records stage rejections in the store and tallies them.
pub struct SkipRecorder {
    store: Arc<dyn HistoryStore>,
}

impl SkipRecorder {
    /// Creates a new recorder.
    #[must_use]
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Writes every event and bumps the matching counter in `stats`.
    ///
    /// Returns the number of events that were new to the log. Duplicate
    /// events are still counted in `stats`.
    ///
    /// # Errors
    ///
    /// Returns the first write error. The audit log is part of the run's
    /// contract, so a failed write aborts the run.
    pub fn record(&self, events: &[SkipEvent], stats: &mut PipelineStats) -> Result<usize> {
        let mut written = 0;
        for event in events {
            if self.store.record_skip(event)? {
                written += 1;
            } else {
                tracing::debug!(
                    source_url = %event.source_url,
                    reason = %event.reason,
                    "Skip event already logged"
                );
            }
            stats.record_skip(event.reason);
        }
        Ok(written)
    }
}
