//! Source-URL identity filter.

use crate::Result;
use crate::models::{Post, SkipEvent, SkipReason};
use crate::storage::HistoryStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::types::{FilterStage, StageOutcome};

/// Rejects posts whose source URL was already seen.
///
/// # How it works
///
/// 1. Posts without a URL pass untouched
/// 2. A URL seen earlier in the batch is a `session_duplicate`
/// 3. A URL present in history is a `url_duplicate`
///
/// Only accepted URLs enter the seen-set, so the first occurrence wins.
pub struct IdentityFilter {
    store: Arc<dyn HistoryStore>,
}

impl IdentityFilter {
    /// Creates a new identity filter.
    #[must_use]
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }
}

impl FilterStage for IdentityFilter {
    fn name(&self) -> &'static str {
        "identity"
    }

    #[instrument(skip(self, posts), fields(operation = "identity_filter", batch = posts.len()))]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome> {
        let start = Instant::now();
        let mut outcome = StageOutcome::with_capacity(posts.len());
        let mut seen: HashSet<String> = HashSet::new();

        for post in posts {
            if post.source_url.is_empty() {
                outcome.pass(post);
                continue;
            }

            if seen.contains(&post.source_url) {
                let event = SkipEvent::new(&post, SkipReason::SessionDuplicate)
                    .with_match(post.source_url.clone());
                outcome.skip(event);
                continue;
            }

            if let Some(record) = self.store.lookup_by_url(&post.source_url)? {
                let mut event =
                    SkipEvent::new(&post, SkipReason::UrlDuplicate).with_match(record.source_url);
                event.matched_record_date = record.created_at;
                outcome.skip(event);
                continue;
            }

            seen.insert(post.source_url.clone());
            outcome.pass(post);
        }

        metrics::histogram!("dedup_filter_duration_ms", "filter" => "identity")
            .record(start.elapsed().as_millis() as f64);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PostRecord, SqliteHistoryStore};

    fn filter_with_history(urls: &[&str]) -> IdentityFilter {
        let store = SqliteHistoryStore::in_memory().unwrap();
        for (i, url) in urls.iter().enumerate() {
            let post = Post::new(format!("stored {i}"), *url);
            store
                .insert_post(&PostRecord::from_post(&post, format!("hash-{i}"), None))
                .unwrap();
        }
        IdentityFilter::new(Arc::new(store))
    }

    #[test]
    fn test_first_seen_wins() {
        let filter = filter_with_history(&[]);
        let posts = vec![Post::new("A", "https://u"), Post::new("B", "https://u")];

        let outcome = filter.process(posts).unwrap();

        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.survivors[0].text, "A");
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::SessionDuplicate);
        assert_eq!(outcome.skipped[0].raw_text, "B");
    }

    #[test]
    fn test_history_match_is_url_duplicate() {
        let filter = filter_with_history(&["https://old"]);
        let outcome = filter
            .process(vec![Post::new("again", "https://old"), Post::new("new", "https://new")])
            .unwrap();

        assert_eq!(outcome.survivors.len(), 1);
        let event = &outcome.skipped[0];
        assert_eq!(event.reason, SkipReason::UrlDuplicate);
        assert_eq!(event.matched_url.as_deref(), Some("https://old"));
        assert!(event.matched_record_date.is_some());
    }

    #[test]
    fn test_history_duplicates_do_not_enter_seen_set() {
        let filter = filter_with_history(&["https://old"]);
        let outcome = filter
            .process(vec![Post::new("a", "https://old"), Post::new("b", "https://old")])
            .unwrap();

        let reasons: Vec<SkipReason> = outcome.skipped.iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec![SkipReason::UrlDuplicate, SkipReason::UrlDuplicate]);
    }

    #[test]
    fn test_empty_url_passes() {
        let filter = filter_with_history(&[]);
        let outcome = filter
            .process(vec![Post::new("a", ""), Post::new("b", "")])
            .unwrap();

        assert_eq!(outcome.survivors.len(), 2);
        assert!(outcome.skipped.is_empty());
    }
}
