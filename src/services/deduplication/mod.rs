//! Duplicate filtering stages.
//!
//! Three filters run in order, each consuming the survivors of the previous:
//! 1. **Identity**: source URL seen earlier in the batch or stored in history
//! 2. **Fingerprint**: SHA256 of the trimmed text matches history (and,
//!    optionally, an earlier post of the batch)
//! 3. **Semantic**: embedding cosine similarity above the threshold, first
//!    within the batch (clusters collapse to one representative), then against
//!    every stored embedding
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          FilterStage                              │
//! │  ┌────────────────┐  ┌────────────────┐  ┌─────────────────────┐  │
//! │  │ IdentityFilter │─►│ Fingerprint    │─►│ SemanticDedupEngine │  │
//! │  │                │  │ Filter         │  │                     │  │
//! │  │ seen-set +     │  │ SHA256 +       │  │ greedy clusters +   │  │
//! │  │ URL lookup     │  │ hash lookup    │  │ history max-cosine  │  │
//! │  └────────────────┘  └────────────────┘  └─────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod fingerprint;
mod hasher;
mod identity;
mod semantic;
mod types;

pub use config::{DEFAULT_SEMANTIC_THRESHOLD, DeduplicationConfig};
pub(crate) use config::checked_threshold;
pub use fingerprint::FingerprintFilter;
pub use hasher::ContentHasher;
pub use identity::IdentityFilter;
pub use semantic::{
    RepresentativeScore, SemanticDedupEngine, cluster_indices, exceeds_threshold, select_best,
};
pub use types::{FilterStage, StageOutcome};
