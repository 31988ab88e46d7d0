//! LRU-cached embedder wrapper.

use super::Embedder;
use crate::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Wraps an embedder so identical text is embedded once per process.
///
/// Repeated text is common across scraped batches (cross-posted news, the
/// rewritten text of an unchanged post). Lock poisoning fails open: the
/// inner embedder is called directly and the result is not cached.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachingEmbedder {
    /// Default number of cached embeddings.
    pub const DEFAULT_CAPACITY: usize = 2048;

    /// Creates a caching wrapper holding up to `capacity` embeddings.
    ///
    /// A zero capacity falls back to [`Self::DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(Self::DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Number of cached embeddings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Embedder for CachingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(text) {
                metrics::counter!("embedding_cache_hits_total").increment(1);
                return Ok(hit.clone());
            }
        }

        metrics::counter!("embedding_cache_misses_total").increment(1);
        let embedding = self.inner.embed(text)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}
