//! Approved-post persistence.

use crate::embedding::Embedder;
use crate::models::Post;
use crate::services::deduplication::ContentHasher;
use crate::storage::{HistoryStore, InsertOutcome, PostRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Result of persisting a batch.
#[derive(Debug, Clone, Default)]
pub struct PersistOutcome {
    /// Posts the store accepted, in input order.
    pub approved: Vec<Post>,
    /// Rows written or already present.
    pub inserted: usize,
    /// Posts whose write failed.
    pub failed: usize,
}

/// Writes approved posts to history.
///
/// Inserts are keyed by content hash and are no-ops on conflict. A failed
/// write is logged and counted; the rest of the batch is still attempted.
pub struct PersistenceGateway {
    store: Arc<dyn HistoryStore>,
    embedder: Arc<dyn Embedder>,
}

impl PersistenceGateway {
    /// Creates a new gateway.
    #[must_use]
    pub fn new(store: Arc<dyn HistoryStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Persists every post.
    #[instrument(skip(self, posts), fields(operation = "persist", batch = posts.len()))]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    pub fn insert(&self, posts: Vec<Post>) -> PersistOutcome {
        let start = Instant::now();
        let mut outcome = PersistOutcome {
            approved: Vec::with_capacity(posts.len()),
            ..PersistOutcome::default()
        };

        for mut post in posts {
            let hash = post
                .content_hash
                .clone()
                .unwrap_or_else(|| ContentHasher::hash(post.raw_text()));
            post.content_hash = Some(hash.clone());

            let record = PostRecord::from_post(&post, hash, self.rewritten_vector(&post));
            match self.store.insert_post(&record) {
                Ok(InsertOutcome::Inserted) => {
                    tracing::info!(source_url = %post.source_url, "Post stored");
                    outcome.inserted += 1;
                    outcome.approved.push(post);
                },
                Ok(InsertOutcome::AlreadyPresent) => {
                    tracing::debug!(source_url = %post.source_url, "Post already stored");
                    outcome.inserted += 1;
                    outcome.approved.push(post);
                },
                Err(e) => {
                    tracing::error!(source_url = %post.source_url, error = %e, "Failed to store post");
                    metrics::counter!("ingest_persist_failures_total").increment(1);
                    outcome.failed += 1;
                },
            }
        }

        metrics::histogram!("persist_batch_duration_ms")
            .record(start.elapsed().as_millis() as f64);

        outcome
    }

    /// Embeds the published text when it differs from the raw text.
    fn rewritten_vector(&self, post: &Post) -> Option<Vec<f32>> {
        let published = post.text.trim();
        if published.is_empty() || published == post.raw_text().trim() {
            return None;
        }
        match self.embedder.embed(published) {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    source_url = %post.source_url,
                    error = %e,
                    "Failed to embed rewritten text, storing without it"
                );
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FixedEmbedder, FlakyStore};
    use crate::storage::SqliteHistoryStore;

    fn rewritten(raw: &str, published: &str, url: &str) -> Post {
        let mut post = Post::new(published, url);
        post.original_text = Some(raw.to_string());
        post.rewritten_text = Some(published.to_string());
        post.embedding_raw = Some(vec![1.0, 0.0]);
        post
    }

    #[test]
    fn test_insert_stores_both_vectors() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let embedder = FixedEmbedder::new().with("published", vec![0.0, 1.0]);
        let gateway = PersistenceGateway::new(store.clone(), Arc::new(embedder));

        let outcome = gateway.insert(vec![rewritten("raw", "published", "https://a")]);

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.failed, 0);
        let hash = ContentHasher::hash("raw");
        assert_eq!(outcome.approved[0].content_hash.as_deref(), Some(hash.as_str()));
        let record = store.lookup_by_hash(&hash).unwrap().unwrap();
        assert_eq!(record.source_url, "https://a");
        assert_eq!(record.raw_text, "raw");
    }

    #[test]
    fn test_existing_hash_is_reused() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let gateway = PersistenceGateway::new(store.clone(), Arc::new(FixedEmbedder::new()));
        let mut post = Post::new("text", "https://a");
        post.content_hash = Some("precomputed".to_string());

        gateway.insert(vec![post]);
        assert!(store.lookup_by_hash("precomputed").unwrap().is_some());
    }

    #[test]
    fn test_repeated_insert_counts_as_inserted() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let gateway = PersistenceGateway::new(store.clone(), Arc::new(FixedEmbedder::new()));

        gateway.insert(vec![Post::new("same", "https://a")]);
        let outcome = gateway.insert(vec![Post::new("same", "https://a")]);

        assert_eq!(outcome.inserted, 1);
        assert_eq!(store.count_posts().unwrap(), 1);
    }

    #[test]
    fn test_rewrite_embedding_failure_still_stores() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let gateway = PersistenceGateway::new(store.clone(), Arc::new(FixedEmbedder::new()));

        let outcome = gateway.insert(vec![rewritten("raw", "published", "https://a")]);
        assert_eq!(outcome.inserted, 1);
    }

    #[test]
    fn test_write_failure_does_not_abort_batch() {
        let store = Arc::new(FlakyStore::new().failing_insert("https://bad"));
        let gateway = PersistenceGateway::new(store.clone(), Arc::new(FixedEmbedder::new()));

        let outcome = gateway.insert(vec![
            Post::new("one", "https://bad"),
            Post::new("two", "https://good"),
        ]);

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.approved.len(), 1);
        assert_eq!(outcome.approved[0].source_url, "https://good");
        assert_eq!(store.inner().count_posts().unwrap(), 1);
    }
}
