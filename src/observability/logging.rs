//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Directive used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "postsieve=info,warn";

/// Directive used with `--verbose`.
pub const VERBOSE_FILTER: &str = "postsieve=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves logging from settings and the process environment.
    ///
    /// Filter precedence: `--verbose`, `POSTSIEVE_LOG`, `RUST_LOG`, the
    /// configured filter, then [`DEFAULT_FILTER`].
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::resolve(settings, verbose, &|key| std::env::var(key).ok())
    }

    pub(crate) fn resolve(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let format = settings
            .format
            .as_deref()
            .and_then(|f| {
                let parsed = LogFormat::parse(f);
                if parsed.is_none() {
                    eprintln!("unknown log format '{f}', using pretty");
                }
                parsed
            })
            .unwrap_or_default();

        let filter = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            ["POSTSIEVE_LOG", "RUST_LOG"]
                .into_iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
                .or_else(|| settings.filter.clone())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };

        Self {
            format,
            filter,
            file: settings.file.clone(),
        }
    }
}
