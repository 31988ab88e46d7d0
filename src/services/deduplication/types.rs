//! Stage result types.

use crate::Result;
use crate::models::{Post, SkipEvent};

/// Result of running one filtering stage over a batch.
///
/// `survivors` keeps input order (except where a stage documents otherwise);
/// `skipped` holds exactly one event per rejected post.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    /// Posts that passed the stage.
    pub survivors: Vec<Post>,
    /// One audit event per rejected post.
    pub skipped: Vec<SkipEvent>,
}

impl StageOutcome {
    /// Creates an empty outcome with room for `capacity` survivors.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            survivors: Vec::with_capacity(capacity),
            skipped: Vec::new(),
        }
    }

    /// Keeps a post.
    pub fn pass(&mut self, post: Post) {
        self.survivors.push(post);
    }

    /// Rejects a post.
    pub fn skip(&mut self, event: SkipEvent) {
        tracing::debug!(
            source_url = %event.source_url,
            reason = %event.reason,
            "Post skipped"
        );
        metrics::counter!("ingest_skipped_total", "reason" => event.reason.as_str()).increment(1);
        self.skipped.push(event);
    }

    /// Number of posts the stage saw.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.survivors.len() + self.skipped.len()
    }
}

/// A pipeline stage that only removes or annotates posts.
pub trait FilterStage: Send + Sync {
    /// Stage name used in logs, metrics and cancellation errors.
    fn name(&self) -> &'static str;

    /// Runs the stage over `posts`.
    ///
    /// # Errors
    ///
    /// Returns an error only for stage-level failures, such as an unreachable
    /// store. Per-post failures become skip events.
    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SkipReason;

    #[test]
    fn test_processed_counts_both_sides() {
        let mut outcome = StageOutcome::with_capacity(2);
        let kept = Post::new("a", "https://a");
        let dropped = Post::new("b", "https://b");
        outcome.skip(SkipEvent::new(&dropped, SkipReason::UrlDuplicate));
        outcome.pass(kept);

        assert_eq!(outcome.processed(), 2);
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.skipped[0].source_url, "https://b");
    }
}
