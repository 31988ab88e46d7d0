//! Exact-duplicate filter via content hash.

use crate::Result;
use crate::models::{Post, SkipEvent, SkipReason};
use crate::storage::HistoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::hasher::ContentHasher;
use super::types::{FilterStage, StageOutcome};

/// Rejects posts whose text fingerprint is already known.
///
/// # How it works
///
/// 1. Blank text is rejected as `empty_text` before hashing
/// 2. The SHA256 of the trimmed text is looked up in history
/// 3. With `in_batch_hash_check`, a hash already held by an earlier survivor
///    of the batch is also rejected
///
/// Survivors leave with `content_hash` set; later stages reuse it.
pub struct FingerprintFilter {
    store: Arc<dyn HistoryStore>,
    in_batch: bool,
}

impl FingerprintFilter {
    /// Creates a new fingerprint filter.
    #[must_use]
    pub fn new(store: Arc<dyn HistoryStore>, config: &DeduplicationConfig) -> Self {
        Self {
            store,
            in_batch: config.in_batch_hash_check,
        }
    }
}

impl FilterStage for FingerprintFilter {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    #[instrument(skip(self, posts), fields(operation = "fingerprint_filter", batch = posts.len()))]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome> {
        let start = Instant::now();
        let mut outcome = StageOutcome::with_capacity(posts.len());
        // hash -> URL of the first survivor carrying it
        let mut batch_hashes: HashMap<String, String> = HashMap::new();

        for mut post in posts {
            if post.text.trim().is_empty() {
                outcome.skip(SkipEvent::new(&post, SkipReason::EmptyText));
                continue;
            }

            let hash = ContentHasher::hash(&post.text);

            if let Some(record) = self.store.lookup_by_hash(&hash)? {
                let mut event = SkipEvent::new(&post, SkipReason::HashDuplicate)
                    .with_hash(hash)
                    .with_match(record.source_url);
                event.matched_record_date = record.created_at;
                outcome.skip(event);
                continue;
            }

            if self.in_batch {
                if let Some(earlier_url) = batch_hashes.get(&hash) {
                    let event = SkipEvent::new(&post, SkipReason::HashDuplicate)
                        .with_hash(hash)
                        .with_match(earlier_url.clone());
                    outcome.skip(event);
                    continue;
                }
                batch_hashes.insert(hash.clone(), post.source_url.clone());
            }

            post.content_hash = Some(hash);
            outcome.pass(post);
        }

        metrics::histogram!("dedup_filter_duration_ms", "filter" => "fingerprint")
            .record(start.elapsed().as_millis() as f64);

        Ok(outcome)
    }
}
