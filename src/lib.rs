//! # Postsieve
//!
//! Deduplicating ingestion pipeline for scraped social-media posts.
//!
//! Postsieve takes a batch of already-normalized posts and decides which ones
//! are novel enough to publish. Exact and near-duplicate content is rejected
//! against both the current batch and everything persisted by earlier runs,
//! and every rejection is written to an append-only audit log.
//!
//! ## Stages
//!
//! ```text
//! posts ─► Identity ─► Fingerprint ─► Semantic ─► MediaPolicy ─► Rewrite ─► Persist
//!            (URL)       (SHA256)     (cosine)    (video size)    (LLM)     (SQLite)
//! ```
//!
//! Each stage only shrinks or annotates the batch. The only reordering happens
//! in the semantic stage, where cluster representatives are emitted after the
//! unclustered posts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use postsieve::PostsieveConfig;
//! use postsieve::services::{PipelineDeps, PipelineOrchestrator};
//!
//! let config = PostsieveConfig::load(None)?;
//! let deps = PipelineDeps::from_config(&config)?;
//! let pipeline = PipelineOrchestrator::new(deps, &config);
//! let outcome = pipeline.run(posts)?;
//! println!("inserted {} of {}", outcome.stats.inserted, outcome.stats.total);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod llm;
pub mod media;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::PostsieveConfig;
pub use embedding::Embedder;
pub use llm::LlmProvider;
pub use media::SizeProbe;
pub use models::{HistoricalRecord, LinkPreview, PipelineStats, Post, SkipEvent, SkipReason};
pub use services::{PipelineOrchestrator, PipelineOutcome};
pub use storage::{HistoryStore, SqliteHistoryStore};

/// Error type for postsieve operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed batch files, empty text handed to an embedder |
/// | `OperationFailed` | Storage queries, HTTP calls, model inference or parsing fail |
/// | `StoreUnavailable` | The historical store cannot be reached at the start of a run |
/// | `Cancelled` | A run was abandoned between two stages |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` reads or writes fail
    /// - An LLM or size-probe HTTP request fails
    /// - The embedding model cannot be loaded
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The historical store is unreachable.
    ///
    /// Deduplication cannot be guaranteed without history, so this aborts the
    /// run before any stage writes.
    #[error("historical store unavailable: {0}")]
    StoreUnavailable(String),

    /// The run was cancelled before the named stage started.
    #[error("pipeline cancelled before stage '{stage}'")]
    Cancelled {
        /// The stage that did not run.
        stage: String,
    },
}

/// Result type alias for postsieve operations.
pub type Result<T> = std::result::Result<T, Error>;
