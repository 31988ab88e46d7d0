//! Near-duplicate detection by embedding similarity.
//!
//! Works in two passes over the batch:
//!
//! 1. **In-batch clustering**: a single greedy left-to-right pass. Each
//!    unclustered post seeds a cluster and absorbs every later unclustered post
//!    whose similarity to the *seed* exceeds the threshold. Clusters are never
//!    merged, so `A~B` and `B~C` does not put `C` with `A`.
//! 2. **History comparison**: unclustered posts and cluster representatives
//!    are compared against every stored embedding.

use crate::Result;
use crate::embedding::{Embedder, cosine_similarity};
use crate::models::{HistoricalEmbedding, Post, SkipEvent, SkipReason};
use crate::storage::HistoryStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::types::{FilterStage, StageOutcome};

/// Weight added for a link preview target.
const LINK_PREVIEW_WEIGHT: usize = 100;
/// Weight added for a link preview photo.
const LINK_PHOTO_WEIGHT: usize = 50;

/// Returns true when `similarity` counts as a duplicate at `threshold`.
///
/// The comparison is strict: a similarity equal to the threshold is not a
/// duplicate.
#[must_use]
pub fn exceeds_threshold(similarity: f32, threshold: f32) -> bool {
    similarity > threshold
}

/// Ranking used to pick a cluster representative.
///
/// Compares by attachment presence first, then by `weight` (trimmed text
/// length plus link preview bonuses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RepresentativeScore {
    /// Post carries a photo, GIF or video.
    pub has_media: bool,
    /// Trimmed character count plus preview bonuses.
    pub weight: usize,
}

impl RepresentativeScore {
    /// Scores a post.
    #[must_use]
    pub fn of(post: &Post) -> Self {
        let mut weight = post.text.trim().chars().count();
        if post.link_preview_url().is_some() {
            weight += LINK_PREVIEW_WEIGHT;
        }
        if post.link_preview_photo().is_some() {
            weight += LINK_PHOTO_WEIGHT;
        }
        Self {
            has_media: post.has_attachments(),
            weight,
        }
    }
}

/// Picks the representative of a cluster.
///
/// Returns the index of the highest-scoring post; ties keep the earliest.
/// Returns `None` for an empty slice.
#[must_use]
pub fn select_best(members: &[&Post]) -> Option<usize> {
    let mut best: Option<(usize, RepresentativeScore)> = None;
    for (i, post) in members.iter().enumerate() {
        let score = RepresentativeScore::of(post);
        match best {
            Some((_, current)) if score <= current => {},
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Groups posts into near-duplicate clusters.
///
/// Every index appears in exactly one cluster; each cluster starts with its
/// seed and lists members in input order. Posts sharing a source URL are never
/// clustered together; two posts without a URL count as sharing one.
#[must_use]
pub fn cluster_indices(posts: &[Post], threshold: f32) -> Vec<Vec<usize>> {
    let mut clustered = vec![false; posts.len()];
    let mut clusters = Vec::new();

    for i in 0..posts.len() {
        if clustered[i] {
            continue;
        }
        clustered[i] = true;
        let seed = &posts[i];
        let seed_vector = seed.embedding_raw.as_deref().unwrap_or_default();
        let mut cluster = vec![i];

        for j in (i + 1)..posts.len() {
            if clustered[j] || same_identity(seed, &posts[j]) {
                continue;
            }
            let other_vector = posts[j].embedding_raw.as_deref().unwrap_or_default();
            let similarity = cosine_similarity(seed_vector, other_vector);
            if exceeds_threshold(similarity, threshold) {
                tracing::debug!(
                    seed_url = %seed.source_url,
                    member_url = %posts[j].source_url,
                    similarity = similarity,
                    "In-batch near-duplicate found"
                );
                clustered[j] = true;
                cluster.push(j);
            }
        }

        clusters.push(cluster);
    }

    clusters
}

fn same_identity(a: &Post, b: &Post) -> bool {
    a.source_url == b.source_url
}

/// Finds the stored embedding most similar to `vector`.
///
/// Vectors of a different dimension are ignored. Ties keep the first entry in
/// history order.
fn best_history_match(vector: &[f32], history: &[HistoricalEmbedding]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, entry) in history.iter().enumerate() {
        if entry.vector.len() != vector.len() {
            continue;
        }
        let similarity = cosine_similarity(vector, &entry.vector);
        match best {
            Some((_, current)) if similarity <= current => {},
            _ => best = Some((i, similarity)),
        }
    }
    best
}

/// Near-duplicate filter.
///
/// # Example
///
/// ```rust,ignore
/// use postsieve::services::deduplication::{DeduplicationConfig, SemanticDedupEngine};
///
/// let engine = SemanticDedupEngine::new(embedder, store, &DeduplicationConfig::default());
/// let outcome = engine.process(posts)?;
/// ```
pub struct SemanticDedupEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn HistoryStore>,
    threshold: f32,
}

impl SemanticDedupEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn HistoryStore>,
        config: &DeduplicationConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            threshold: config.semantic_threshold,
        }
    }

    /// Returns the similarity threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Attaches an embedding to every post that can carry one.
    fn embed_all(&self, posts: Vec<Post>, outcome: &mut StageOutcome) -> Vec<Post> {
        let mut embedded = Vec::with_capacity(posts.len());
        for mut post in posts {
            let text = post.text.trim();
            if text.is_empty() {
                outcome.skip(SkipEvent::new(&post, SkipReason::EmptyText));
                continue;
            }
            if post.embedding_raw.as_ref().is_some_and(|v| !v.is_empty()) {
                embedded.push(post);
                continue;
            }

            match self.embedder.embed(text) {
                Ok(vector) if !vector.is_empty() => {
                    post.embedding_raw = Some(vector);
                    embedded.push(post);
                },
                Ok(_) => {
                    tracing::warn!(source_url = %post.source_url, "Embedder returned an empty vector");
                    outcome.skip(SkipEvent::new(&post, SkipReason::EmbeddingFailed));
                },
                Err(e) => {
                    tracing::warn!(source_url = %post.source_url, error = %e, "Embedding failed");
                    outcome.skip(SkipEvent::new(&post, SkipReason::EmbeddingFailed));
                },
            }
        }
        embedded
    }

    /// Collapses in-batch clusters to their representatives.
    ///
    /// Returns unclustered posts first, then one representative per cluster in
    /// cluster order.
    fn collapse_clusters(&self, posts: Vec<Post>, outcome: &mut StageOutcome) -> Vec<Post> {
        let clusters = cluster_indices(&posts, self.threshold);
        let mut slots: Vec<Option<Post>> = posts.into_iter().map(Some).collect();
        let mut singles = Vec::new();
        let mut representatives = Vec::new();

        for cluster in clusters {
            if let [only] = cluster.as_slice() {
                singles.extend(slots[*only].take());
                continue;
            }

            let members: Vec<&Post> = cluster.iter().filter_map(|&i| slots[i].as_ref()).collect();
            let rep_index = cluster[select_best(&members).unwrap_or(0)];
            let Some(representative) = slots[rep_index].take() else {
                continue;
            };
            let rep_vector = representative.embedding_raw.as_deref().unwrap_or_default();

            tracing::info!(
                representative = %representative.source_url,
                size = cluster.len(),
                "Collapsed near-duplicate cluster"
            );

            for &i in cluster.iter().filter(|&&i| i != rep_index) {
                let Some(member) = slots[i].take() else {
                    continue;
                };
                let similarity = cosine_similarity(
                    member.embedding_raw.as_deref().unwrap_or_default(),
                    rep_vector,
                );
                outcome.skip(
                    SkipEvent::new(&member, SkipReason::SemanticDuplicateInBatch)
                        .with_match(representative.source_url.clone())
                        .with_similarity(similarity),
                );
            }
            representatives.push(representative);
        }

        singles.extend(representatives);
        singles
    }

    /// Rejects posts too similar to a stored post.
    fn compare_with_history(&self, posts: Vec<Post>, outcome: &mut StageOutcome) -> Result<()> {
        let history = self.store.all_embeddings()?;
        tracing::info!(
            history = history.len(),
            candidates = posts.len(),
            "Comparing against stored embeddings"
        );

        for post in posts {
            let vector = post.embedding_raw.as_deref().unwrap_or_default();
            match best_history_match(vector, &history) {
                Some((index, similarity)) if exceeds_threshold(similarity, self.threshold) => {
                    let matched_url = history[index].source_url.clone();
                    self.log_matched_text(&post, &matched_url, similarity);
                    outcome.skip(
                        SkipEvent::new(&post, SkipReason::SemanticDuplicate)
                            .with_match(matched_url)
                            .with_similarity(similarity),
                    );
                },
                _ => outcome.pass(post),
            }
        }
        Ok(())
    }

    fn log_matched_text(&self, post: &Post, matched_url: &str, similarity: f32) {
        let stored = match self.store.raw_text_by_url(matched_url) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(matched_url = %matched_url, error = %e, "Failed to load matched text");
                None
            },
        };
        tracing::debug!(
            source_url = %post.source_url,
            matched_url = %matched_url,
            similarity = similarity,
            new_text = %preview(&post.text),
            stored_text = %stored.as_deref().map(preview).unwrap_or_default(),
            "Near-duplicate of stored post"
        );
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}

impl FilterStage for SemanticDedupEngine {
    fn name(&self) -> &'static str {
        "semantic"
    }

    #[instrument(
        skip(self, posts),
        fields(operation = "semantic_dedup", batch = posts.len(), threshold = self.threshold)
    )]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome> {
        let start = Instant::now();
        let mut outcome = StageOutcome::with_capacity(posts.len());

        let embedded = self.embed_all(posts, &mut outcome);
        let collapsed = self.collapse_clusters(embedded, &mut outcome);
        self.compare_with_history(collapsed, &mut outcome)?;

        metrics::histogram!("dedup_filter_duration_ms", "filter" => "semantic")
            .record(start.elapsed().as_millis() as f64);

        Ok(outcome)
    }
}
