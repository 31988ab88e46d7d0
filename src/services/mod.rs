//! Pipeline services.
//!
//! Each stage is a service over injected capabilities. The
//! [`PipelineOrchestrator`] wires them in order and owns the run's counters.

pub mod deduplication;

mod audit;
mod intake;
mod media_policy;
mod persistence;
mod pipeline;
mod rewrite;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::SkipRecorder;
pub use intake::{ContentValidator, IntakeNormalizer, IntakeReport, RawPost, clean_text};
pub use media_policy::MediaPolicyFilter;
pub use persistence::{PersistOutcome, PersistenceGateway};
pub use pipeline::{CancellationToken, PipelineDeps, PipelineOrchestrator, PipelineOutcome};
pub use rewrite::{RewriteOrchestrator, RewriteOutcome};
