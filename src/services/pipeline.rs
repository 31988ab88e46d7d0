//! Pipeline orchestration.

use crate::config::PostsieveConfig;
use crate::embedding::{Embedder, default_embedder};
use crate::llm::{Rewriter, build_rewriter};
use crate::media::{HttpSizeProbe, SizeProbe};
use crate::models::{PipelineStats, Post};
use crate::services::audit::SkipRecorder;
use crate::services::deduplication::{
    FilterStage, FingerprintFilter, IdentityFilter, SemanticDedupEngine,
};
use crate::services::intake::ContentValidator;
use crate::services::media_policy::MediaPolicyFilter;
use crate::services::persistence::PersistenceGateway;
use crate::services::rewrite::RewriteOrchestrator;
use crate::storage::{HistoryStore, SqliteHistoryStore};
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Shared flag for abandoning a run between stages.
///
/// Clones observe the same flag. Work already persisted is kept.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// External capabilities the pipeline runs against.
#[derive(Clone)]
pub struct PipelineDeps {
    /// Historical store.
    pub store: Arc<dyn HistoryStore>,
    /// Text embedder.
    pub embedder: Arc<dyn Embedder>,
    /// Video size probe.
    pub probe: Arc<dyn SizeProbe>,
    /// Text rewriter.
    pub rewriter: Arc<dyn Rewriter>,
}

impl PipelineDeps {
    /// Builds the production capabilities from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the history database cannot be opened.
    pub fn from_config(config: &PostsieveConfig) -> Result<Self> {
        let store = SqliteHistoryStore::new(&config.database_path)?;
        Ok(Self {
            store: Arc::new(store),
            embedder: default_embedder(config.embedding_cache_capacity),
            probe: Arc::new(HttpSizeProbe::new(config.media.probe_timeout_ms)),
            rewriter: build_rewriter(&config.rewrite),
        })
    }
}

/// Terminal result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Identifier of the run, also attached to its log span.
    pub run_id: Uuid,
    /// Reconciled counters.
    pub stats: PipelineStats,
    /// Posts persisted by this run, ready for publishing.
    pub approved: Vec<Post>,
}

/// Runs a batch through every stage in order.
///
/// Stages: validation, identity, fingerprint, semantic, media policy, then
/// rewrite and persistence. Each filtering stage's rejections are written to
/// the audit log before the next stage starts.
///
/// # Example
///
/// ```rust,ignore
/// use postsieve::services::{PipelineDeps, PipelineOrchestrator};
///
/// let deps = PipelineDeps::from_config(&config)?;
/// let outcome = PipelineOrchestrator::new(deps, &config).run(posts)?;
/// assert!(outcome.stats.is_reconciled());
/// ```
pub struct PipelineOrchestrator {
    store: Arc<dyn HistoryStore>,
    stages: Vec<Box<dyn FilterStage>>,
    rewrite: RewriteOrchestrator,
    persistence: PersistenceGateway,
    recorder: SkipRecorder,
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    /// Creates a pipeline over `deps`.
    #[must_use]
    pub fn new(deps: PipelineDeps, config: &PostsieveConfig) -> Self {
        let stages: Vec<Box<dyn FilterStage>> = vec![
            Box::new(ContentValidator),
            Box::new(IdentityFilter::new(Arc::clone(&deps.store))),
            Box::new(FingerprintFilter::new(Arc::clone(&deps.store), &config.dedup)),
            Box::new(SemanticDedupEngine::new(
                Arc::clone(&deps.embedder),
                Arc::clone(&deps.store),
                &config.dedup,
            )),
            Box::new(MediaPolicyFilter::new(Arc::clone(&deps.probe), &config.media)),
        ];

        Self {
            rewrite: RewriteOrchestrator::new(deps.rewriter),
            persistence: PersistenceGateway::new(Arc::clone(&deps.store), deps.embedder),
            recorder: SkipRecorder::new(Arc::clone(&deps.store)),
            store: deps.store,
            stages,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to observe cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs one batch.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreUnavailable`] if the store fails its health check; nothing
    ///   is written.
    /// - [`Error::Cancelled`] if the token is set between stages.
    /// - Any stage-level failure, such as a failed history read or audit write.
    ///
    /// An aborted run returns no stats.
    #[instrument(
        name = "pipeline_run",
        skip(self, posts),
        fields(operation = "pipeline_run", run_id = tracing::field::Empty, batch = posts.len())
    )]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    pub fn run(&self, posts: Vec<Post>) -> Result<PipelineOutcome> {
        let run_id = Uuid::now_v7();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let start = Instant::now();

        self.store.health_check().map_err(|e| match e {
            Error::StoreUnavailable(_) => e,
            other => Error::StoreUnavailable(other.to_string()),
        })?;

        let mut stats = PipelineStats::new(posts.len());
        metrics::counter!("ingest_posts_total").increment(posts.len() as u64);

        let mut survivors = posts;
        for stage in &self.stages {
            self.ensure_active(stage.name())?;
            let stage_start = Instant::now();
            let before = survivors.len();

            let outcome = stage.process(survivors)?;
            self.recorder.record(&outcome.skipped, &mut stats)?;
            survivors = outcome.survivors;

            metrics::histogram!("ingest_stage_duration_ms", "stage" => stage.name())
                .record(stage_start.elapsed().as_millis() as f64);
            tracing::info!(
                stage = stage.name(),
                before = before,
                after = survivors.len(),
                "Stage complete"
            );
        }

        self.ensure_active("rewrite")?;
        let stage_start = Instant::now();
        let rewritten = self.rewrite.rewrite_all(survivors);
        stats.rewritten = rewritten.rewritten;
        let persisted = self.persistence.insert(rewritten.posts);
        stats.inserted = persisted.inserted;
        stats.failed = persisted.failed;
        metrics::histogram!("ingest_stage_duration_ms", "stage" => "rewrite_persist")
            .record(stage_start.elapsed().as_millis() as f64);

        if !stats.is_reconciled() {
            tracing::error!(stats = %stats, "Run counters do not reconcile");
        }
        tracing::info!(
            stats = %stats,
            duration_ms = start.elapsed().as_millis(),
            "Pipeline run complete"
        );

        Ok(PipelineOutcome {
            run_id,
            stats,
            approved: persisted.approved,
        })
    }

    fn ensure_active(&self, stage: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(stage = stage, "Pipeline cancelled");
            return Err(Error::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}
