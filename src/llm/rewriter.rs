//! News rewrite capability.

use super::LlmProvider;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// System prompt for news rewriting.
pub const REWRITE_SYSTEM_PROMPT: &str = "\
You are an editor who rewrites news posts. Rewrite the text you are given:
1. Keep the meaning: every key fact, name, number and event stays unchanged.
2. Make it unique: use different wording, synonyms and sentence structure.
3. Write for a news channel: informative and easy to read.
4. Output ONLY the rewritten text. No comments, greetings or preambles such as 'Here is the rewritten text:'.
5. Keep the tone: a neutral source stays neutral.";

/// Rewrites post text before publishing.
///
/// Output is untrusted; the caller decides whether to accept it.
pub trait Rewriter: Send + Sync {
    /// Whether rewriting is active.
    ///
    /// When false the caller publishes the original text unchanged.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns a rewritten version of `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying service fails or times out.
    fn rewrite(&self, text: &str) -> Result<String>;
}

/// Rewriter used when rewriting is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRewriter;

impl Rewriter for DisabledRewriter {
    fn is_enabled(&self) -> bool {
        false
    }

    fn rewrite(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Rewriter backed by an LLM provider.
pub struct LlmRewriter {
    provider: Arc<dyn LlmProvider>,
}

impl LlmRewriter {
    /// Creates a rewriter for `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

impl Rewriter for LlmRewriter {
    #[instrument(skip(self, text), fields(operation = "rewrite", provider = self.provider.name(), text_length = text.len()))]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn rewrite(&self, text: &str) -> Result<String> {
        let start = Instant::now();
        let result = self
            .provider
            .complete_with_system(REWRITE_SYSTEM_PROMPT, text)
            .map(|s| s.trim().to_string());

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::histogram!(
            "llm_request_duration_ms",
            "provider" => self.provider.name(),
            "status" => status
        )
        .record(start.elapsed().as_millis() as f64);

        result
    }
}
