//! Pipeline integration tests.
//!
//! Runs whole batches through `PipelineOrchestrator` against real `SQLite`
//! stores (in-memory and on disk) with deterministic capabilities:
//! - Mixed batch accounting and audit log contents
//! - Re-run idempotence
//! - Cluster representative selection
//! - Fatal store failure and cancellation

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use postsieve::config::PostsieveConfig;
use postsieve::embedding::Embedder;
use postsieve::llm::{DisabledRewriter, Rewriter};
use postsieve::media::SizeProbe;
use postsieve::models::{
    HistoricalEmbedding, HistoricalRecord, Post, SkipEvent, SkipReason,
};
use postsieve::services::deduplication::{DeduplicationConfig, FilterStage, FingerprintFilter};
use postsieve::services::{
    CancellationToken, PersistenceGateway, PipelineDeps, PipelineOrchestrator,
};
use postsieve::storage::{HistoryStore, InsertOutcome, PostRecord, SqliteHistoryStore};
use postsieve::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Embedder backed by a lookup table.
struct TableEmbedder {
    vectors: HashMap<&'static str, Vec<f32>>,
}

impl TableEmbedder {
    fn new(entries: &[(&'static str, &[f32])]) -> Self {
        Self {
            vectors: entries.iter().map(|(t, v)| (*t, v.to_vec())).collect(),
        }
    }
}

impl Embedder for TableEmbedder {
    fn dimensions(&self) -> usize {
        3
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| Error::OperationFailed {
                operation: "embed".to_string(),
                cause: format!("no vector for '{text}'"),
            })
    }
}

/// Probe that never knows a size.
struct UnknownSizeProbe;

impl SizeProbe for UnknownSizeProbe {
    fn probe_size_mb(&self, _url: &str) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Rewriter that returns its input unchanged.
struct EchoRewriter;

impl Rewriter for EchoRewriter {
    fn rewrite(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Store that is always down.
struct DownStore;

fn down<T>() -> Result<T> {
    Err(Error::OperationFailed {
        operation: "connect".to_string(),
        cause: "connection refused".to_string(),
    })
}

impl HistoryStore for DownStore {
    fn health_check(&self) -> Result<()> {
        down()
    }
    fn lookup_by_hash(&self, _hash: &str) -> Result<Option<HistoricalRecord>> {
        down()
    }
    fn lookup_by_url(&self, _url: &str) -> Result<Option<HistoricalRecord>> {
        down()
    }
    fn all_embeddings(&self) -> Result<Vec<HistoricalEmbedding>> {
        down()
    }
    fn raw_text_by_url(&self, _url: &str) -> Result<Option<String>> {
        down()
    }
    fn insert_post(&self, _record: &PostRecord) -> Result<InsertOutcome> {
        down()
    }
    fn record_skip(&self, _event: &SkipEvent) -> Result<bool> {
        down()
    }
    fn count_posts(&self) -> Result<u64> {
        down()
    }
    fn recent_skips(&self, _limit: usize) -> Result<Vec<SkipEvent>> {
        down()
    }
}

fn embedder() -> Arc<TableEmbedder> {
    Arc::new(TableEmbedder::new(&[
        ("Bridge closed for repairs", &[1.0, 0.0, 0.0]),
        ("The bridge is closed for repairs", &[0.99, 0.05, 0.0]),
        ("Repairs close the bridge", &[0.98, 0.08, 0.0]),
        ("Concert tonight in the park", &[0.0, 1.0, 0.0]),
        ("New bakery opens downtown", &[0.0, 0.0, 1.0]),
        ("Fresh take on an old story", &[0.5, 0.5, 0.5]),
    ]))
}

fn deps(store: Arc<dyn HistoryStore>, rewriter: Arc<dyn Rewriter>) -> PipelineDeps {
    PipelineDeps {
        store,
        embedder: embedder(),
        probe: Arc::new(UnknownSizeProbe),
        rewriter,
    }
}

fn pipeline(store: Arc<dyn HistoryStore>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(deps(store, Arc::new(EchoRewriter)), &PostsieveConfig::new())
}

fn seed_history(store: &SqliteHistoryStore, url: &str) {
    let post = Post::new("Archived story", url);
    store
        .insert_post(&PostRecord::from_post(&post, "archived-hash".to_string(), None))
        .unwrap();
}

fn mixed_batch() -> Vec<Post> {
    vec![
        Post::new("", "https://vk.com/wall-1_1"),
        Post::new("Concert tonight in the park", "https://vk.com/wall-1_2"),
        Post::new("Concert tonight in the park", "https://vk.com/wall-2_7"),
        Post::new("Fresh take on an old story", "https://vk.com/wall-9_9"),
        Post::new("New bakery opens downtown", "https://vk.com/wall-3_4"),
    ]
}

// ============================================================================
// End-to-end accounting
// ============================================================================

#[test]
fn test_mixed_batch_end_to_end() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    seed_history(&store, "https://vk.com/wall-9_9");

    let outcome = pipeline(store.clone()).run(mixed_batch()).unwrap();
    let stats = outcome.stats;

    assert_eq!(stats.total, 5);
    assert_eq!(stats.dropped_empty, 1);
    assert_eq!(stats.skipped_by_hash, 1);
    assert_eq!(stats.skipped_by_url, 1);
    assert_eq!(stats.skipped_by_semantic, 0);
    assert_eq!(stats.skipped_by_size, 0);
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.rewritten, 0);
    assert!(stats.is_reconciled());

    let approved: Vec<&str> = outcome.approved.iter().map(|p| p.source_url.as_str()).collect();
    assert_eq!(
        approved,
        vec!["https://vk.com/wall-1_2", "https://vk.com/wall-3_4"]
    );

    let mut reasons: Vec<SkipReason> = store
        .recent_skips(10)
        .unwrap()
        .into_iter()
        .map(|e| e.reason)
        .collect();
    reasons.sort_by_key(SkipReason::as_str);
    assert_eq!(
        reasons,
        vec![
            SkipReason::EmptyContent,
            SkipReason::HashDuplicate,
            SkipReason::UrlDuplicate
        ]
    );
}

#[test]
fn test_hash_duplicate_matches_earlier_post() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    pipeline(store.clone()).run(mixed_batch()).unwrap();

    let event = store
        .recent_skips(10)
        .unwrap()
        .into_iter()
        .find(|e| e.reason == SkipReason::HashDuplicate)
        .unwrap();
    assert_eq!(event.source_url, "https://vk.com/wall-2_7");
    assert_eq!(event.matched_url.as_deref(), Some("https://vk.com/wall-1_2"));
}

#[test]
fn test_in_batch_hash_check_can_be_disabled() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let mut config = PostsieveConfig::new();
    config.dedup = DeduplicationConfig::default().with_in_batch_hash_check(false);
    let pipeline = PipelineOrchestrator::new(deps(store.clone(), Arc::new(EchoRewriter)), &config);

    let outcome = pipeline
        .run(vec![
            Post::new("Concert tonight in the park", "https://a"),
            Post::new("Concert tonight in the park", "https://b"),
        ])
        .unwrap();

    // Identical vectors collapse in the semantic stage instead.
    assert_eq!(outcome.stats.skipped_by_hash, 0);
    assert_eq!(outcome.stats.skipped_by_semantic, 1);
    assert_eq!(outcome.stats.inserted, 1);
}

#[test]
fn test_video_post_represents_cluster() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let outcome = pipeline(store)
        .run(vec![
            Post::new("The bridge is closed for repairs", "https://long"),
            Post::new("Bridge closed for repairs", "https://video")
                .with_video_urls(vec!["https://vk.com/video-1_1".to_string()]),
            Post::new("Repairs close the bridge", "https://short"),
        ])
        .unwrap();

    assert_eq!(outcome.stats.skipped_by_semantic, 2);
    assert_eq!(outcome.approved.len(), 1);
    assert_eq!(outcome.approved[0].source_url, "https://video");
}

#[test]
fn test_semantic_duplicate_of_history() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    pipeline(store.clone())
        .run(vec![Post::new("Bridge closed for repairs", "https://first")])
        .unwrap();

    let outcome = pipeline(store.clone())
        .run(vec![Post::new("The bridge is closed for repairs", "https://second")])
        .unwrap();

    assert_eq!(outcome.stats.skipped_by_semantic, 1);
    let event = &store.recent_skips(1).unwrap()[0];
    assert_eq!(event.reason, SkipReason::SemanticDuplicate);
    assert_eq!(event.matched_url.as_deref(), Some("https://first"));
    assert!(event.matched_record_date.is_some());
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_rerun_inserts_nothing() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let first = pipeline(store.clone()).run(mixed_batch()).unwrap();
    let second = pipeline(store.clone()).run(mixed_batch()).unwrap();

    assert_eq!(second.stats.inserted, 0);
    assert!(second.approved.is_empty());
    assert!(second.stats.is_reconciled());
    assert_eq!(store.count_posts().unwrap(), first.stats.inserted as u64);
}

#[test]
fn test_fingerprint_after_persist_rejects_everything() {
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let gateway = PersistenceGateway::new(Arc::clone(&store), embedder());
    let fingerprint = FingerprintFilter::new(Arc::clone(&store), &DeduplicationConfig::default());
    let batch = vec![
        Post::new("Concert tonight in the park", "https://a"),
        Post::new("New bakery opens downtown", "https://b"),
    ];

    let first = gateway.insert(fingerprint.process(batch.clone()).unwrap().survivors);
    assert_eq!(first.inserted, 2);

    let outcome = fingerprint.process(batch).unwrap();
    assert!(outcome.survivors.is_empty());
    assert!(outcome.skipped.iter().all(|e| e.reason == SkipReason::HashDuplicate));
    assert_eq!(gateway.insert(outcome.survivors).inserted, 0);
}

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("history.db");

    {
        let store = Arc::new(SqliteHistoryStore::new(&path).unwrap());
        pipeline(store).run(mixed_batch()).unwrap();
    }

    let store = Arc::new(SqliteHistoryStore::new(&path).unwrap());
    assert_eq!(store.count_posts().unwrap(), 2);
    let outcome = pipeline(store).run(mixed_batch()).unwrap();
    assert_eq!(outcome.stats.inserted, 0);
}

// ============================================================================
// Rewrite bookkeeping
// ============================================================================

#[test]
fn test_disabled_rewrite_counts_every_approved_post() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let pipeline = PipelineOrchestrator::new(
        deps(store, Arc::new(DisabledRewriter)),
        &PostsieveConfig::new(),
    );

    let outcome = pipeline.run(mixed_batch()).unwrap();
    assert_eq!(outcome.stats.rewritten, outcome.stats.inserted);
}

#[test]
fn test_unchanged_rewrite_keeps_original_text() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let outcome = pipeline(store)
        .run(vec![Post::new("New bakery opens downtown", "https://a")])
        .unwrap();

    assert_eq!(outcome.stats.rewritten, 0);
    assert_eq!(outcome.approved[0].text, "New bakery opens downtown");
}

// ============================================================================
// Fatal paths
// ============================================================================

#[test]
fn test_unreachable_store_is_fatal() {
    let result = pipeline(Arc::new(DownStore)).run(mixed_batch());
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

#[test]
fn test_cancelled_run_writes_nothing() {
    let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    let token = CancellationToken::new();
    token.cancel();

    let result = pipeline(store.clone())
        .with_cancellation(token)
        .run(mixed_batch());

    assert!(matches!(result, Err(Error::Cancelled { .. })));
    assert_eq!(store.count_posts().unwrap(), 0);
    assert!(store.recent_skips(10).unwrap().is_empty());
}
