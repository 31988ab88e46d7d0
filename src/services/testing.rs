//! Deterministic test doubles for the pipeline capabilities.

use crate::embedding::Embedder;
use crate::llm::Rewriter;
use crate::media::SizeProbe;
use crate::models::{HistoricalEmbedding, HistoricalRecord, SkipEvent};
use crate::storage::{HistoryStore, InsertOutcome, PostRecord, SqliteHistoryStore};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn scripted_failure(operation: &str, subject: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("scripted failure for {subject}"),
    }
}

/// Embedder returning fixed vectors per text; unknown text fails.
#[derive(Debug, Clone, Default)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

impl Embedder for FixedEmbedder {
    fn dimensions(&self) -> usize {
        self.vectors.values().next().map_or(2, Vec::len)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| scripted_failure("embed", text))
    }
}

#[derive(Debug, Clone, Copy)]
enum ProbeReply {
    Size(f64),
    Unknown,
    Failure,
}

/// Size probe with scripted answers. Unscripted URLs are of unknown size.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    replies: HashMap<String, ProbeReply>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, url: &str, size_mb: f64) -> Self {
        self.replies.insert(url.to_string(), ProbeReply::Size(size_mb));
        self
    }

    pub fn with_unknown(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), ProbeReply::Unknown);
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), ProbeReply::Failure);
        self
    }

    /// Number of probes made, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SizeProbe for ScriptedProbe {
    fn probe_size_mb(&self, url: &str) -> Result<Option<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(url) {
            Some(ProbeReply::Size(size)) => Ok(Some(*size)),
            Some(ProbeReply::Unknown) | None => Ok(None),
            Some(ProbeReply::Failure) => Err(scripted_failure("probe_size", url)),
        }
    }
}

/// Rewriter with scripted replies. Unscripted text is echoed back.
#[derive(Debug, Clone)]
pub struct ScriptedRewriter {
    enabled: bool,
    replies: HashMap<String, String>,
    failures: HashSet<String>,
}

impl ScriptedRewriter {
    pub fn new() -> Self {
        Self {
            enabled: true,
            replies: HashMap::new(),
            failures: HashSet::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn with_reply(mut self, text: &str, reply: &str) -> Self {
        self.replies.insert(text.to_string(), reply.to_string());
        self
    }

    pub fn with_failure(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }
}

impl Rewriter for ScriptedRewriter {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn rewrite(&self, text: &str) -> Result<String> {
        if self.failures.contains(text) {
            return Err(scripted_failure("rewrite", text));
        }
        Ok(self
            .replies
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

/// Store that is unreachable for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl HistoryStore for FailingStore {
    fn health_check(&self) -> Result<()> {
        Err(Error::StoreUnavailable("scripted outage".to_string()))
    }

    fn lookup_by_hash(&self, hash: &str) -> Result<Option<HistoricalRecord>> {
        Err(scripted_failure("lookup_by_hash", hash))
    }

    fn lookup_by_url(&self, url: &str) -> Result<Option<HistoricalRecord>> {
        Err(scripted_failure("lookup_by_url", url))
    }

    fn all_embeddings(&self) -> Result<Vec<HistoricalEmbedding>> {
        Err(scripted_failure("all_embeddings", "history"))
    }

    fn raw_text_by_url(&self, url: &str) -> Result<Option<String>> {
        Err(scripted_failure("raw_text_by_url", url))
    }

    fn insert_post(&self, record: &PostRecord) -> Result<InsertOutcome> {
        Err(scripted_failure("insert_post", &record.source_url))
    }

    fn record_skip(&self, event: &SkipEvent) -> Result<bool> {
        Err(scripted_failure("record_skip", &event.source_url))
    }

    fn count_posts(&self) -> Result<u64> {
        Err(scripted_failure("count_posts", "posts"))
    }

    fn recent_skips(&self, _limit: usize) -> Result<Vec<SkipEvent>> {
        Err(scripted_failure("recent_skips", "skipped_posts"))
    }
}

/// In-memory store whose writes can be made to fail.
pub struct FlakyStore {
    inner: SqliteHistoryStore,
    failing_inserts: HashSet<String>,
    failing_skips: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteHistoryStore::in_memory().unwrap(),
            failing_inserts: HashSet::new(),
            failing_skips: false,
        }
    }

    /// Fails the insert of the post with `url`.
    pub fn failing_insert(mut self, url: &str) -> Self {
        self.failing_inserts.insert(url.to_string());
        self
    }

    /// Fails every skip-event write.
    pub fn failing_skips(mut self) -> Self {
        self.failing_skips = true;
        self
    }

    pub fn inner(&self) -> &SqliteHistoryStore {
        &self.inner
    }
}

impl HistoryStore for FlakyStore {
    fn health_check(&self) -> Result<()> {
        self.inner.health_check()
    }

    fn lookup_by_hash(&self, hash: &str) -> Result<Option<HistoricalRecord>> {
        self.inner.lookup_by_hash(hash)
    }

    fn lookup_by_url(&self, url: &str) -> Result<Option<HistoricalRecord>> {
        self.inner.lookup_by_url(url)
    }

    fn all_embeddings(&self) -> Result<Vec<HistoricalEmbedding>> {
        self.inner.all_embeddings()
    }

    fn raw_text_by_url(&self, url: &str) -> Result<Option<String>> {
        self.inner.raw_text_by_url(url)
    }

    fn insert_post(&self, record: &PostRecord) -> Result<InsertOutcome> {
        if self.failing_inserts.contains(&record.source_url) {
            return Err(scripted_failure("insert_post", &record.source_url));
        }
        self.inner.insert_post(record)
    }

    fn record_skip(&self, event: &SkipEvent) -> Result<bool> {
        if self.failing_skips {
            return Err(scripted_failure("record_skip", &event.source_url));
        }
        self.inner.record_skip(event)
    }

    fn count_posts(&self) -> Result<u64> {
        self.inner.count_posts()
    }

    fn recent_skips(&self, limit: usize) -> Result<Vec<SkipEvent>> {
        self.inner.recent_skips(limit)
    }
}
