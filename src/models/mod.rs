//! Data models for postsieve.
//!
//! This module contains the records threaded through the pipeline and the
//! projections read back from the historical store.

mod history;
mod post;
mod skip;
mod stats;

pub use history::{HistoricalEmbedding, HistoricalRecord};
pub use post::{LinkPreview, Post};
pub(crate) use post::post_date_format;
pub use skip::{SkipEvent, SkipReason};
pub use stats::PipelineStats;
