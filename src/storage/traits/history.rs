//! History store trait.

use crate::Result;
use crate::models::{HistoricalEmbedding, HistoricalRecord, Post, SkipEvent};
use chrono::NaiveDateTime;

/// Row written for an approved post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    /// Content fingerprint; the conflict key.
    pub content_hash: String,
    /// Pre-rewrite text.
    pub raw_text: String,
    /// Published text.
    pub rewritten_text: String,
    /// Embedding of the raw text.
    pub vector_raw: Option<Vec<f32>>,
    /// Embedding of the rewritten text, when it differs from the raw text.
    pub vector_rewritten: Option<Vec<f32>>,
    /// Source URL.
    pub source_url: String,
    /// Source group.
    pub group_name: String,
    /// Original publication time.
    pub post_date: Option<NaiveDateTime>,
    /// Photo attachments.
    pub media_urls: Vec<String>,
    /// GIF attachments.
    pub gif_urls: Vec<String>,
    /// Video attachments.
    pub video_urls: Vec<String>,
    /// Link preview target.
    pub link_preview_url: Option<String>,
    /// Link preview thumbnail.
    pub link_preview_photo_url: Option<String>,
}

impl PostRecord {
    /// Builds a record from an approved post.
    ///
    /// The caller supplies the hash and the rewritten-text embedding; the raw
    /// embedding is taken from the post.
    #[must_use]
    pub fn from_post(post: &Post, content_hash: String, vector_rewritten: Option<Vec<f32>>) -> Self {
        Self {
            content_hash,
            raw_text: post.raw_text().to_string(),
            rewritten_text: post.text.clone(),
            vector_raw: post.embedding_raw.clone(),
            vector_rewritten,
            source_url: post.source_url.clone(),
            group_name: post.group_name.clone(),
            post_date: post.post_date,
            media_urls: post.media_urls.clone(),
            gif_urls: post.gif_urls.clone(),
            video_urls: post.video_urls.clone(),
            link_preview_url: post.link_preview_url().map(str::to_string),
            link_preview_photo_url: post.link_preview_photo().map(str::to_string),
        }
    }
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted,
    /// A row with the same hash already existed; nothing changed.
    AlreadyPresent,
}

/// Historical store of persisted posts and the skip audit log.
///
/// Implementations must make [`insert_post`](Self::insert_post) a no-op on a
/// duplicate hash and [`record_skip`](Self::record_skip) a no-op on a
/// duplicate `(source_url, reason, content_hash)`.
pub trait HistoryStore: Send + Sync {
    /// Verifies the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve queries.
    fn health_check(&self) -> Result<()>;

    /// Looks up a persisted post by content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn lookup_by_hash(&self, hash: &str) -> Result<Option<HistoricalRecord>>;

    /// Looks up a persisted post by source URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn lookup_by_url(&self, url: &str) -> Result<Option<HistoricalRecord>>;

    /// Loads every stored raw embedding, in storage order.
    ///
    /// Unparsable vectors are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn all_embeddings(&self) -> Result<Vec<HistoricalEmbedding>>;

    /// Returns the raw text of the post stored under `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn raw_text_by_url(&self, url: &str) -> Result<Option<String>>;

    /// Inserts an approved post, ignoring hash conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails for any reason other than a conflict.
    fn insert_post(&self, record: &PostRecord) -> Result<InsertOutcome>;

    /// Appends a skip event, ignoring duplicates.
    ///
    /// Resolves `matched_record_date` from the matched URL when the event
    /// does not carry one. Returns false if the event was already recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_skip(&self, event: &SkipEvent) -> Result<bool>;

    /// Counts persisted posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_posts(&self) -> Result<u64>;

    /// Returns the most recent skip events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn recent_skips(&self, limit: usize) -> Result<Vec<SkipEvent>>;
}
