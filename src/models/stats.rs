//! Aggregate counters for one pipeline run.

use super::SkipReason;
use serde::{Deserialize, Serialize};

/// Per-run statistics.
///
/// For a completed run the counters always reconcile:
/// `total == inserted + skipped()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Posts in the input batch.
    pub total: usize,
    /// Posts accepted by the store (including conflict no-ops).
    pub inserted: usize,
    /// Posts rejected as exact duplicates.
    pub skipped_by_hash: usize,
    /// Posts rejected by source URL.
    pub skipped_by_url: usize,
    /// Posts rejected as near duplicates or because embedding failed.
    pub skipped_by_semantic: usize,
    /// Posts rejected by the video size policy.
    pub skipped_by_size: usize,
    /// Posts dropped for empty content or blank text.
    pub dropped_empty: usize,
    /// Posts whose history write failed.
    pub failed: usize,
    /// Posts whose published text counts as rewritten.
    pub rewritten: usize,
}

impl PipelineStats {
    /// Creates stats for a batch of `total` posts.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Bumps the counter that owns `reason`.
    pub const fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::SessionDuplicate | SkipReason::UrlDuplicate => self.skipped_by_url += 1,
            SkipReason::EmptyContent | SkipReason::EmptyText => self.dropped_empty += 1,
            SkipReason::HashDuplicate => self.skipped_by_hash += 1,
            SkipReason::SemanticDuplicateInBatch
            | SkipReason::SemanticDuplicate
            | SkipReason::EmbeddingFailed => self.skipped_by_semantic += 1,
            SkipReason::VideoTooLarge => self.skipped_by_size += 1,
        }
    }

    /// Sum of every non-inserted outcome.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped_by_hash
            + self.skipped_by_url
            + self.skipped_by_semantic
            + self.skipped_by_size
            + self.dropped_empty
            + self.failed
    }

    /// Returns true if every input post is accounted for exactly once.
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        self.total == self.inserted + self.skipped()
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} inserted={} hash={} url={} semantic={} size={} empty={} failed={} rewritten={}",
            self.total,
            self.inserted,
            self.skipped_by_hash,
            self.skipped_by_url,
            self.skipped_by_semantic,
            self.skipped_by_size,
            self.dropped_empty,
            self.failed,
            self.rewritten
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SkipReason::SessionDuplicate => (0, 1, 0, 0, 0); "session duplicate counts as url")]
    #[test_case(SkipReason::UrlDuplicate => (0, 1, 0, 0, 0); "url duplicate")]
    #[test_case(SkipReason::HashDuplicate => (1, 0, 0, 0, 0); "hash duplicate")]
    #[test_case(SkipReason::SemanticDuplicateInBatch => (0, 0, 1, 0, 0); "in batch semantic")]
    #[test_case(SkipReason::SemanticDuplicate => (0, 0, 1, 0, 0); "history semantic")]
    #[test_case(SkipReason::EmbeddingFailed => (0, 0, 1, 0, 0); "embedding failure")]
    #[test_case(SkipReason::VideoTooLarge => (0, 0, 0, 1, 0); "video too large")]
    #[test_case(SkipReason::EmptyText => (0, 0, 0, 0, 1); "empty text")]
    #[test_case(SkipReason::EmptyContent => (0, 0, 0, 0, 1); "empty content")]
    fn test_record_skip_routes_reason(reason: SkipReason) -> (usize, usize, usize, usize, usize) {
        let mut stats = PipelineStats::new(1);
        stats.record_skip(reason);
        assert!(stats.is_reconciled());
        (
            stats.skipped_by_hash,
            stats.skipped_by_url,
            stats.skipped_by_semantic,
            stats.skipped_by_size,
            stats.dropped_empty,
        )
    }

    #[test]
    fn test_reconciliation_includes_failed() {
        let mut stats = PipelineStats::new(3);
        stats.inserted = 1;
        stats.failed = 1;
        assert!(!stats.is_reconciled());
        stats.record_skip(SkipReason::HashDuplicate);
        assert!(stats.is_reconciled());
        assert_eq!(stats.skipped(), 2);
    }

    #[test]
    fn test_rewritten_is_not_part_of_reconciliation() {
        let mut stats = PipelineStats::new(1);
        stats.inserted = 1;
        stats.rewritten = 1;
        assert!(stats.is_reconciled());
    }

    #[test]
    fn test_display() {
        let stats = PipelineStats::new(2);
        assert!(stats.to_string().starts_with("total=2 inserted=0"));
    }
}
