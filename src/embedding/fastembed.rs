//! FastEmbed-based embedder.
//!
//! Semantic embeddings with all-MiniLM-L6-v2 via fastembed-rs. Only compiled
//! with the `fastembed-embeddings` feature.

use super::{DEFAULT_DIMENSIONS, Embedder};
use crate::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;
use std::time::Instant;

/// Process-wide embedding model, loaded on first use.
static EMBEDDING_MODEL: OnceLock<fastembed::TextEmbedding> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// The model is lazily loaded on the first embed call. The first call blocks
/// while the ONNX model loads; later calls reuse the cached instance.
pub struct FastEmbedEmbedder {
    /// Model name for logging.
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2",
        }
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn get_model() -> Result<&'static fastembed::TextEmbedding> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        tracing::info!("Loading embedding model (first use)...");
        let start = Instant::now();

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model =
            fastembed::TextEmbedding::try_new(options).map_err(|e| Error::OperationFailed {
                operation: "load_embedding_model".to_string(),
                cause: e.to_string(),
            })?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = "all-MiniLM-L6-v2",
            "Embedding model loaded"
        );

        // Another thread may have won the race; either instance is fine.
        let _ = EMBEDDING_MODEL.set(model);
        EMBEDDING_MODEL.get().ok_or_else(|| Error::OperationFailed {
            operation: "get_embedding_model".to_string(),
            cause: "model initialization race".to_string(),
        })
    }

    fn run_model(texts: Vec<String>, operation: &str) -> Result<Vec<Vec<f32>>> {
        let model = Self::get_model()?;
        let batch_size = texts.len();

        // ONNX runtime can panic on malformed inputs.
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)));

        result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    panic_message = %panic_msg,
                    batch_size,
                    "ONNX runtime panicked during embedding"
                );
                Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: format!("ONNX runtime panic: {panic_msg}"),
                }
            })?
            .map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            })
    }
}

impl Default for FastEmbedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }

        Self::run_model(vec![text.to_string()], "embed")?
            .into_iter()
            .next()
            .ok_or_else(|| Error::OperationFailed {
                operation: "embed".to_string(),
                cause: "No embedding returned from model".to_string(),
            })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }

        Self::run_model(
            texts.iter().map(|s| (*s).to_string()).collect(),
            "embed_batch",
        )
    }
}
