//! Embedding generation.
//!
//! Provides embeddings using fastembed when the `fastembed-embeddings` feature
//! is enabled, or deterministic hash-based pseudo-embeddings otherwise.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod cached;
mod fallback;
#[cfg(feature = "fastembed-embeddings")]
mod fastembed;

pub use cached::CachingEmbedder;
pub use fallback::HashEmbedder;
#[cfg(feature = "fastembed-embeddings")]
pub use fastembed::FastEmbedEmbedder;

use crate::Result;
use std::sync::Arc;

/// Embedding dimensions of all-MiniLM-L6-v2.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding generators.
///
/// Implementations must be deterministic for identical input within one
/// process lifetime.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Builds the process embedder, wrapped in an LRU cache.
///
/// Uses the ONNX model when compiled with `fastembed-embeddings`, the hash
/// embedder otherwise.
#[must_use]
pub fn default_embedder(cache_capacity: usize) -> Arc<dyn Embedder> {
    #[cfg(feature = "fastembed-embeddings")]
    let inner: Arc<dyn Embedder> = Arc::new(FastEmbedEmbedder::new());
    #[cfg(not(feature = "fastembed-embeddings"))]
    let inner: Arc<dyn Embedder> = {
        tracing::warn!(
            "fastembed-embeddings feature not enabled; near-duplicate detection uses hash embeddings"
        );
        Arc::new(HashEmbedder::new())
    };

    Arc::new(CachingEmbedder::new(inner, cache_capacity))
}

/// Computes cosine similarity between two embedding vectors.
///
/// # Returns
///
/// Cosine similarity in range [-1.0, 1.0], or 0.0 if the vectors differ in
/// length, are empty, or either has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
