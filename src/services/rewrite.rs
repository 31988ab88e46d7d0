//! Rewrite stage.

use crate::llm::Rewriter;
use crate::models::Post;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Posts after rewriting, with the number counted as rewritten.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    /// All input posts, in input order.
    pub posts: Vec<Post>,
    /// Posts whose published text counts as rewritten.
    pub rewritten: usize,
}

/// Runs the rewrite capability over surviving posts.
///
/// Never rejects a post. When the rewriter is disabled the original text is
/// published and still counted as rewritten. When enabled, a reply is used
/// only if it is non-blank after trimming and differs from the original;
/// failures fall back to the original text.
pub struct RewriteOrchestrator {
    rewriter: Arc<dyn Rewriter>,
}

impl RewriteOrchestrator {
    /// Creates a new rewrite orchestrator.
    #[must_use]
    pub fn new(rewriter: Arc<dyn Rewriter>) -> Self {
        Self { rewriter }
    }

    /// Rewrites every post in place.
    #[instrument(
        skip(self, posts),
        fields(operation = "rewrite", batch = posts.len(), enabled = self.rewriter.is_enabled())
    )]
    pub fn rewrite_all(&self, posts: Vec<Post>) -> RewriteOutcome {
        let start = Instant::now();
        let enabled = self.rewriter.is_enabled();
        let mut outcome = RewriteOutcome {
            posts: Vec::with_capacity(posts.len()),
            rewritten: 0,
        };

        for mut post in posts {
            let original = post.raw_text().to_string();
            let accepted = if enabled {
                self.accept(&post, &original)
            } else {
                Some(original.clone())
            };

            let status = match accepted {
                Some(text) => {
                    outcome.rewritten += 1;
                    post.text = text;
                    "rewritten"
                },
                None => {
                    post.text.clone_from(&original);
                    "original"
                },
            };
            metrics::counter!("ingest_rewrites_total", "outcome" => status).increment(1);

            post.rewritten_text = Some(post.text.clone());
            post.original_text = Some(original);
            outcome.posts.push(post);
        }

        tracing::info!(
            rewritten = outcome.rewritten,
            duration_ms = start.elapsed().as_millis(),
            "Rewrite stage complete"
        );

        outcome
    }

    /// Returns the accepted rewrite, or `None` to keep the original.
    fn accept(&self, post: &Post, original: &str) -> Option<String> {
        match self.rewriter.rewrite(original) {
            Ok(reply) => {
                let reply = reply.trim();
                if reply.is_empty() {
                    tracing::warn!(source_url = %post.source_url, "Rewrite came back empty, keeping original");
                    None
                } else if reply == original.trim() {
                    tracing::debug!(source_url = %post.source_url, "Rewrite unchanged, keeping original");
                    None
                } else {
                    Some(reply.to_string())
                }
            },
            Err(e) => {
                tracing::error!(source_url = %post.source_url, error = %e, "Rewrite failed, keeping original");
                None
            },
        }
    }
}
