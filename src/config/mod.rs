//! Configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, then `POSTSIEVE_*` environment variables (a `.env` file is loaded
//! first when present).

use crate::services::deduplication::{DeduplicationConfig, checked_threshold};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default video size limit in megabytes.
pub const DEFAULT_MAX_VIDEO_SIZE_MB: f64 = 150.0;

/// Main configuration for postsieve.
#[derive(Debug, Clone)]
pub struct PostsieveConfig {
    /// Path to the `SQLite` history database.
    pub database_path: PathBuf,
    /// Deduplication thresholds and toggles.
    pub dedup: DeduplicationConfig,
    /// Video size policy.
    pub media: MediaConfig,
    /// Text rewrite settings.
    pub rewrite: RewriteConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
    /// Raw-record normalization settings.
    pub intake: IntakeSettings,
    /// Number of embeddings kept in the in-process cache.
    pub embedding_cache_capacity: usize,
}

/// Video size policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaConfig {
    /// Videos strictly larger than this are rejected.
    pub max_video_size_mb: f64,
    /// Timeout for one size probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_video_size_mb: DEFAULT_MAX_VIDEO_SIZE_MB,
            probe_timeout_ms: 10_000,
        }
    }
}

/// Rewrite provider configuration.
#[derive(Debug, Clone, Default)]
pub struct RewriteConfig {
    /// Whether posts are sent to the LLM at all.
    pub enabled: bool,
    /// Provider to use.
    pub provider: RewriteProvider,
    /// Model name (provider default when unset).
    pub model: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available rewrite providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteProvider {
    /// `DeepSeek` via its `OpenAI`-compatible API.
    #[default]
    DeepSeek,
    /// `OpenAI` GPT.
    OpenAi,
    /// Ollama (local).
    Ollama,
}

impl RewriteProvider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "openai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Returns the config string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `postsieve=debug`.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Metrics settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether the Prometheus recorder is installed.
    pub enabled: bool,
    /// Where the rendered snapshot is written after a run.
    pub snapshot_path: Option<PathBuf>,
}

/// Raw-record normalization settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSettings {
    /// Round-robin posts across groups.
    pub interleave_groups: bool,
    /// Drop reposts before normalization.
    pub drop_reposts: bool,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            interleave_groups: true,
            drop_reposts: true,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Embedding cache capacity.
    pub embedding_cache_capacity: Option<usize>,
    /// Deduplication section.
    pub dedup: Option<ConfigFileDedup>,
    /// Media section.
    pub media: Option<ConfigFileMedia>,
    /// Rewrite section.
    pub rewrite: Option<ConfigFileRewrite>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
    /// Intake section.
    pub intake: Option<ConfigFileIntake>,
}

/// `[dedup]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDedup {
    /// Similarity threshold.
    pub semantic_threshold: Option<f32>,
    /// In-batch hash check.
    pub in_batch_hash_check: Option<bool>,
}

/// `[media]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMedia {
    /// Size limit in megabytes.
    pub max_video_size_mb: Option<f64>,
    /// Probe timeout.
    pub probe_timeout_ms: Option<u64>,
}

/// `[rewrite]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRewrite {
    /// Enabled flag.
    pub enabled: Option<bool>,
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

/// `[metrics]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enabled flag.
    pub enabled: Option<bool>,
    /// Snapshot path.
    pub snapshot_path: Option<String>,
}

/// `[intake]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileIntake {
    /// Interleave groups.
    pub interleave_groups: Option<bool>,
    /// Drop reposts.
    pub drop_reposts: Option<bool>,
}

impl Default for PostsieveConfig {
    fn default() -> Self {
        Self {
            database_path: crate::storage::default_db_path(),
            dedup: DeduplicationConfig::default(),
            media: MediaConfig::default(),
            rewrite: RewriteConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            intake: IntakeSettings::default(),
            embedding_cache_capacity: crate::embedding::CachingEmbedder::DEFAULT_CAPACITY,
        }
    }
}

impl PostsieveConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the effective configuration.
    ///
    /// The file is taken from `explicit`, then `POSTSIEVE_CONFIG_PATH`, then
    /// the platform config dir (`<config dir>/postsieve/config.toml`). A
    /// missing platform file means defaults; a missing explicit file is an
    /// error. Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to load .env file");
            }
        }

        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("POSTSIEVE_CONFIG_PATH").ok().map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        Ok(config.with_env_overrides())
    }

    /// Loads configuration from a file path, without env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `PostsieveConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(capacity) = file.embedding_cache_capacity {
            config.embedding_cache_capacity = capacity;
        }
        if let Some(dedup) = file.dedup {
            if let Some(v) = dedup
                .semantic_threshold
                .and_then(|v| checked_threshold("dedup.semantic_threshold", v))
            {
                config.dedup.semantic_threshold = v;
            }
            if let Some(v) = dedup.in_batch_hash_check {
                config.dedup.in_batch_hash_check = v;
            }
        }
        if let Some(media) = file.media {
            if let Some(v) = media.max_video_size_mb {
                config.media.max_video_size_mb = v;
            }
            if let Some(v) = media.probe_timeout_ms {
                config.media.probe_timeout_ms = v;
            }
        }
        if let Some(rewrite) = file.rewrite {
            if let Some(v) = rewrite.enabled {
                config.rewrite.enabled = v;
            }
            if let Some(provider) = rewrite.provider {
                config.rewrite.provider = parse_provider_or_default(&provider);
            }
            config.rewrite.model = rewrite.model;
            config.rewrite.base_url = rewrite.base_url;
            config.rewrite.api_key = rewrite.api_key.map(SecretString::from);
            config.rewrite.timeout_ms = rewrite.timeout_ms;
            config.rewrite.connect_timeout_ms = rewrite.connect_timeout_ms;
        }
        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.filter = logging.filter;
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(v) = metrics.enabled {
                config.metrics.enabled = v;
            }
            config.metrics.snapshot_path = metrics.snapshot_path.map(PathBuf::from);
        }
        if let Some(intake) = file.intake {
            if let Some(v) = intake.interleave_groups {
                config.intake.interleave_groups = v;
            }
            if let Some(v) = intake.drop_reposts {
                config.intake.drop_reposts = v;
            }
        }

        config
    }

    /// Applies `POSTSIEVE_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(&|key| std::env::var(key).ok());
        self
    }

    /// Applies overrides read through `lookup`.
    fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("POSTSIEVE_DB_PATH").filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(path);
        }

        self.dedup.apply_env(lookup);

        if let Some(mb) = lookup("POSTSIEVE_MAX_VIDEO_MB").and_then(|v| v.parse::<f64>().ok()) {
            self.media.max_video_size_mb = mb;
        }

        if let Some(enabled) = lookup("POSTSIEVE_REWRITE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.rewrite.enabled = enabled;
        }
        if let Some(provider) = lookup("POSTSIEVE_AI_PROVIDER") {
            self.rewrite.provider = parse_provider_or_default(&provider);
        }
        if let Some(model) = lookup("POSTSIEVE_AI_MODEL").filter(|v| !v.is_empty()) {
            self.rewrite.model = Some(model);
        }
        if let Some(key) = lookup("POSTSIEVE_AI_API_KEY").filter(|v| !v.is_empty()) {
            self.rewrite.api_key = Some(SecretString::from(key));
        } else if self.rewrite.api_key.is_none() {
            let fallback = match self.rewrite.provider {
                RewriteProvider::DeepSeek => lookup("DEEPSEEK_TOKEN"),
                RewriteProvider::OpenAi => lookup("OPENAI_API_KEY"),
                RewriteProvider::Ollama => None,
            };
            self.rewrite.api_key = fallback.filter(|v| !v.is_empty()).map(SecretString::from);
        }

        if let Some(format) = lookup("POSTSIEVE_LOG_FORMAT").filter(|v| !v.is_empty()) {
            self.logging.format = Some(format);
        }
        if let Some(enabled) = lookup("POSTSIEVE_METRICS_ENABLED").and_then(|v| parse_bool(&v)) {
            self.metrics.enabled = enabled;
        }
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the deduplication config.
    #[must_use]
    pub const fn with_dedup(mut self, dedup: DeduplicationConfig) -> Self {
        self.dedup = dedup;
        self
    }

    /// Enables or disables rewriting.
    #[must_use]
    pub const fn with_rewrite_enabled(mut self, enabled: bool) -> Self {
        self.rewrite.enabled = enabled;
        self
    }

    /// Renders the configuration as TOML with the API key redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let view = ConfigView {
            database_path: self.database_path.display().to_string(),
            embedding_cache_capacity: self.embedding_cache_capacity,
            dedup: DedupView {
                semantic_threshold: self.dedup.semantic_threshold,
                in_batch_hash_check: self.dedup.in_batch_hash_check,
            },
            media: MediaView {
                max_video_size_mb: self.media.max_video_size_mb,
                probe_timeout_ms: self.media.probe_timeout_ms,
            },
            rewrite: RewriteView {
                enabled: self.rewrite.enabled,
                provider: self.rewrite.provider.as_str(),
                model: self.rewrite.model.clone(),
                base_url: self.rewrite.base_url.clone(),
                api_key: self
                    .rewrite
                    .api_key
                    .as_ref()
                    .map(|k| redact(k.expose_secret())),
                timeout_ms: self.rewrite.timeout_ms,
            },
            logging: LoggingView {
                format: self.logging.format.clone(),
                filter: self.logging.filter.clone(),
                file: self.logging.file.as_ref().map(|p| p.display().to_string()),
            },
            metrics: MetricsView {
                enabled: self.metrics.enabled,
                snapshot_path: self
                    .metrics
                    .snapshot_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
            },
            intake: IntakeView {
                interleave_groups: self.intake.interleave_groups,
                drop_reposts: self.intake.drop_reposts,
            },
        };

        toml::to_string_pretty(&view).map_err(|e| Error::OperationFailed {
            operation: "render_config".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Returns the platform config file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.config_dir().join("postsieve").join("config.toml"))
}

/// Parses a boolean flag (`true`/`1`/`yes`/`on`, `false`/`0`/`no`/`off`).
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_provider_or_default(value: &str) -> RewriteProvider {
    RewriteProvider::parse(value).unwrap_or_else(|| {
        tracing::warn!(provider = %value, "Unknown rewrite provider, using deepseek");
        RewriteProvider::default()
    })
}

fn redact(secret: &str) -> String {
    if secret.len() <= 8 {
        return "***".to_string();
    }
    let tail: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("***{tail}")
}

#[derive(Serialize)]
struct ConfigView {
    database_path: String,
    embedding_cache_capacity: usize,
    dedup: DedupView,
    media: MediaView,
    rewrite: RewriteView,
    logging: LoggingView,
    metrics: MetricsView,
    intake: IntakeView,
}

#[derive(Serialize)]
struct DedupView {
    semantic_threshold: f32,
    in_batch_hash_check: bool,
}

#[derive(Serialize)]
struct MediaView {
    max_video_size_mb: f64,
    probe_timeout_ms: u64,
}

#[derive(Serialize)]
struct RewriteView {
    enabled: bool,
    provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct LoggingView {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[derive(Serialize)]
struct MetricsView {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_path: Option<String>,
}

#[derive(Serialize)]
struct IntakeView {
    interleave_groups: bool,
    drop_reposts: bool,
}
