//! Read-only projections of previously persisted posts.

use serde::{Deserialize, Serialize};

/// A previously persisted post.
///
/// Produced by the history store; the pipeline never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Content fingerprint the row is keyed by.
    pub content_hash: String,
    /// Source URL of the persisted post.
    pub source_url: String,
    /// Embedding of the raw text, when one was stored and parses.
    pub embedding_raw: Option<Vec<f32>>,
    /// Pre-rewrite text.
    pub raw_text: String,
    /// Insertion time as stored by the database (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: Option<String>,
}

/// One stored embedding with the URL it belongs to.
///
/// Loaded in bulk, once per semantic stage run.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalEmbedding {
    /// Source URL of the persisted post.
    pub source_url: String,
    /// Raw-text embedding vector.
    pub vector: Vec<f32>,
}

impl HistoricalEmbedding {
    /// Creates a new historical embedding.
    #[must_use]
    pub fn new(source_url: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            source_url: source_url.into(),
            vector,
        }
    }
}
