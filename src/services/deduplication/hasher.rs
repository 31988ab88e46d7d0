//! Content fingerprinting.

use sha2::{Digest, Sha256};

/// Content hasher for exact-duplicate detection.
///
/// The fingerprint covers the trimmed text only, so two posts with the same
/// text hash identically whatever their URLs or attachments.
///
/// # Example
///
/// ```rust
/// use postsieve::services::deduplication::ContentHasher;
///
/// let hash = ContentHasher::hash("Breaking news");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, ContentHasher::hash("  Breaking news\n"));
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the lowercase hex SHA256 of the trimmed text.
    #[must_use]
    pub fn hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Self::normalize(text).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Normalizes text before hashing.
    ///
    /// Only surrounding whitespace is removed. Case and inner spacing are
    /// kept, since they are part of what gets published.
    #[must_use]
    pub fn normalize(text: &str) -> &str {
        text.trim()
    }
}
