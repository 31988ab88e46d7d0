//! Audit records for rejected posts.

use super::Post;
use serde::{Deserialize, Serialize};

/// Why a candidate post was not published.
///
/// A post stops at the first stage that rejects it, so each rejected post
/// carries exactly one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Source URL appeared earlier in the same batch.
    SessionDuplicate,
    /// Source URL already exists in history.
    UrlDuplicate,
    /// Nothing to publish: no text, attachments or preview photo.
    EmptyContent,
    /// Text is blank, so it cannot be fingerprinted or embedded.
    EmptyText,
    /// Content hash matches history or an earlier post in the batch.
    HashDuplicate,
    /// Lost the representative selection inside a near-duplicate cluster.
    SemanticDuplicateInBatch,
    /// Embedding is too similar to a persisted post.
    SemanticDuplicate,
    /// The embedder failed for this post.
    EmbeddingFailed,
    /// An attached video is over the size limit or could not be measured.
    VideoTooLarge,
}

impl SkipReason {
    /// All reasons, in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::EmptyContent,
        Self::SessionDuplicate,
        Self::UrlDuplicate,
        Self::EmptyText,
        Self::HashDuplicate,
        Self::SemanticDuplicateInBatch,
        Self::SemanticDuplicate,
        Self::EmbeddingFailed,
        Self::VideoTooLarge,
    ];

    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionDuplicate => "session_duplicate",
            Self::UrlDuplicate => "url_duplicate",
            Self::EmptyContent => "empty_content",
            Self::EmptyText => "empty_text",
            Self::HashDuplicate => "hash_duplicate",
            Self::SemanticDuplicateInBatch => "semantic_duplicate_in_batch",
            Self::SemanticDuplicate => "semantic_duplicate",
            Self::EmbeddingFailed => "embedding_failed",
            Self::VideoTooLarge => "video_too_large",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit entry for one rejected post.
///
/// # Example
///
/// ```rust
/// use postsieve::models::{Post, SkipEvent, SkipReason};
///
/// let post = Post::new("Same text", "https://vk.com/wall-1_2");
/// let event = SkipEvent::new(&post, SkipReason::SemanticDuplicate)
///     .with_match("https://vk.com/wall-9_1")
///     .with_similarity(0.97);
///
/// assert_eq!(event.reason, SkipReason::SemanticDuplicate);
/// assert_eq!(event.matched_url.as_deref(), Some("https://vk.com/wall-9_1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipEvent {
    /// Source URL of the rejected post.
    pub source_url: String,
    /// Rejection reason.
    pub reason: SkipReason,
    /// Content hash of the rejected post, when known.
    pub content_hash: Option<String>,
    /// URL of the post this one duplicates.
    pub matched_url: Option<String>,
    /// Cosine similarity to the matched post.
    pub similarity: Option<f32>,
    /// Group of the rejected post.
    pub group_name: String,
    /// Pre-rewrite text of the rejected post.
    pub raw_text: String,
    /// Insertion time of the matched post, resolved by the store.
    pub matched_record_date: Option<String>,
}

impl SkipEvent {
    /// Creates an event for `post` with the given reason.
    ///
    /// Copies the URL, group, raw text and any computed hash from the post.
    #[must_use]
    pub fn new(post: &Post, reason: SkipReason) -> Self {
        Self {
            source_url: post.source_url.clone(),
            reason,
            content_hash: post.content_hash.clone(),
            matched_url: None,
            similarity: None,
            group_name: post.group_name.clone(),
            raw_text: post.raw_text().to_string(),
            matched_record_date: None,
        }
    }

    /// Sets the URL of the matched post.
    ///
    /// An empty URL leaves the match unset.
    #[must_use]
    pub fn with_match(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.matched_url = (!url.is_empty()).then_some(url);
        self
    }

    /// Sets the similarity score.
    #[must_use]
    pub const fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Sets the content hash.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}
