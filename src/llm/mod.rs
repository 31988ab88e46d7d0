//! LLM client abstraction.
//!
//! Provides a unified interface for the chat-completion providers used to
//! rewrite post text, plus the [`Rewriter`] capability built on top of them.

mod ollama;
mod openai;
mod rewriter;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use rewriter::{DisabledRewriter, LlmRewriter, REWRITE_SYSTEM_PROMPT, Rewriter};

use crate::Result;
use crate::config::{RewriteConfig, RewriteProvider};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from the rewrite settings.
    #[must_use]
    pub fn from_config(config: &RewriteConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Builds the provider selected in the rewrite settings.
#[must_use]
pub fn build_provider(config: &RewriteConfig) -> Arc<dyn LlmProvider> {
    let http = LlmHttpConfig::from_config(config);
    match config.provider {
        RewriteProvider::DeepSeek | RewriteProvider::OpenAi => {
            let mut client = if config.provider == RewriteProvider::DeepSeek {
                OpenAiClient::deepseek()
            } else {
                OpenAiClient::new()
            };
            client = client.with_http_config(http);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key.expose_secret());
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url);
            }
            Arc::new(client)
        },
        RewriteProvider::Ollama => {
            let mut client = OllamaClient::new().with_http_config(http);
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url);
            }
            Arc::new(client)
        },
    }
}

/// Builds the rewriter for the rewrite settings.
///
/// Returns a [`DisabledRewriter`] when rewriting is turned off.
#[must_use]
pub fn build_rewriter(config: &RewriteConfig) -> Arc<dyn Rewriter> {
    if !config.enabled {
        return Arc::new(DisabledRewriter);
    }
    Arc::new(LlmRewriter::new(build_provider(config)))
}
