//! Hash-based pseudo-embedder.

use super::{DEFAULT_DIMENSIONS, Embedder};
use crate::{Error, Result};
use sha2::{Digest, Sha256};

/// Deterministic pseudo-embedder built from word hashes.
///
/// Identical text always produces an identical unit vector, so exact
/// duplicates still cluster. Paraphrases do NOT: this embedder has no notion
/// of meaning. Use the `fastembed-embeddings` feature for real near-duplicate
/// detection.
pub struct HashEmbedder {
    /// Embedding dimensions.
    dimensions: usize,
}

impl HashEmbedder {
    /// Maximum number of words hashed per text.
    const MAX_WORDS: usize = 1000;

    /// Creates an embedder with the default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    /// Creates an embedder with custom dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn pseudo_embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for (i, word) in text.split_whitespace().take(Self::MAX_WORDS).enumerate() {
            let hash = word_hash(word);
            for j in 0..8 {
                let idx = ((hash >> (j * 8)) as usize + i) % self.dimensions;
                let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
                embedding[idx] += value;
            }
        }

        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq > 0.0 {
            let inv_norm = norm_sq.sqrt().recip();
            for v in &mut embedding {
                *v *= inv_norm;
            }
        }
        embedding
    }
}

/// Bucket hash of a lowercased word: the first 8 bytes of its SHA-256,
/// little-endian.
///
/// Vectors persisted by earlier runs are compared against new ones, so the
/// value must stay fixed across processes and toolchains.
fn word_hash(word: &str) -> u64 {
    let digest = Sha256::digest(word.to_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }
        if self.dimensions == 0 {
            return Err(Error::OperationFailed {
                operation: "embed".to_string(),
                cause: "embedder configured with zero dimensions".to_string(),
            });
        }
        Ok(self.pseudo_embed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_dimensions() {
        assert_eq!(HashEmbedder::new().dimensions(), DEFAULT_DIMENSIONS);
        assert_eq!(HashEmbedder::with_dimensions(16).embed("a b").unwrap().len(), 16);
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = HashEmbedder::new();
        assert!(matches!(embedder.embed(""), Err(Error::InvalidInput(_))));
        assert!(matches!(embedder.embed("  \n"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_dimensions_fail() {
        let embedder = HashEmbedder::with_dimensions(0);
        assert!(embedder.embed("text").is_err());
    }

    #[test]
    fn test_identical_text_is_identical_vector() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("Fire on Lenina street").unwrap();
        let b = embedder.embed("Fire on Lenina street").unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_unit_length() {
        let v = HashEmbedder::new().embed("several words of text").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unrelated_text_is_not_a_duplicate() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("city council approves new budget").unwrap();
        let b = embedder.embed("cats sleep most of the day").unwrap();
        assert!(cosine_similarity(&a, &b) < 0.95);
    }

    #[test]
    fn test_word_hash_is_pinned() {
        assert_eq!(word_hash("fire"), 0x8e81_d12d_b128_9fdc);
        assert_eq!(word_hash("Lenina"), 0x6022_ecfe_1e94_997b);
        assert_eq!(word_hash("FIRE"), word_hash("fire"));
    }

    #[test]
    fn test_case_does_not_change_vector() {
        let embedder = HashEmbedder::with_dimensions(32);
        assert_eq!(
            embedder.embed("Fire on Lenina street").unwrap(),
            embedder.embed("fire ON lenina STREET").unwrap()
        );
    }

    #[test]
    fn test_embed_batch_matches_single() {
        let embedder = HashEmbedder::new();
        let batch = embedder.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two").unwrap());
    }
}
