//! Deduplication configuration.

/// Default cosine-similarity threshold for near-duplicates.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.95;

/// Configuration for the deduplication stages.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `POSTSIEVE_SEMANTIC_THRESHOLD` | f32 | `0.95` | Similarity above which posts are near-duplicates |
/// | `POSTSIEVE_IN_BATCH_HASH_CHECK` | bool | `true` | Reject exact duplicates inside one batch |
///
/// # Example
///
/// ```rust
/// use postsieve::services::deduplication::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default();
/// assert!(config.in_batch_hash_check);
/// assert!((config.semantic_threshold - 0.95).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeduplicationConfig {
    /// Cosine similarity a pair must strictly exceed to count as duplicate.
    pub semantic_threshold: f32,

    /// Whether `FingerprintFilter` rejects a later post whose hash matches an
    /// earlier survivor of the same batch.
    pub in_batch_hash_check: bool,
}

impl DeduplicationConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Falls back to defaults for unset or unparsable variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(&|key| std::env::var(key).ok());
        self
    }

    /// Applies overrides read through `lookup`.
    pub(crate) fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(threshold) = lookup("POSTSIEVE_SEMANTIC_THRESHOLD")
            .and_then(|v| v.parse::<f32>().ok())
            .and_then(|v| checked_threshold("POSTSIEVE_SEMANTIC_THRESHOLD", v))
        {
            self.semantic_threshold = threshold;
        }
        if let Some(enabled) =
            lookup("POSTSIEVE_IN_BATCH_HASH_CHECK").and_then(|v| crate::config::parse_bool(&v))
        {
            self.in_batch_hash_check = enabled;
        }
    }

    /// Builder method to set the semantic threshold.
    #[must_use]
    pub const fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    /// Builder method to toggle the in-batch hash check.
    #[must_use]
    pub const fn with_in_batch_hash_check(mut self, enabled: bool) -> Self {
        self.in_batch_hash_check = enabled;
        self
    }
}

/// Returns `value` if it is a usable similarity threshold.
///
/// NaN, infinities and values outside `[0.0, 1.0]` are rejected with a
/// warning naming `source`.
pub(crate) fn checked_threshold(source: &str, value: f32) -> Option<f32> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Some(value)
    } else {
        tracing::warn!(
            source = source,
            value = %value,
            "Ignoring semantic threshold outside [0.0, 1.0]"
        );
        None
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            in_batch_hash_check: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < f32::EPSILON
    }

    #[test]
    fn test_default_config() {
        let config = DeduplicationConfig::default();
        assert!(approx_eq(config.semantic_threshold, 0.95));
        assert!(config.in_batch_hash_check);
    }

    #[test]
    fn test_builder_methods() {
        let config = DeduplicationConfig::default()
            .with_semantic_threshold(0.9)
            .with_in_batch_hash_check(false);

        assert!(approx_eq(config.semantic_threshold, 0.9));
        assert!(!config.in_batch_hash_check);
    }

    #[test]
    fn test_env_threshold_applied() {
        let mut config = DeduplicationConfig::default();
        config.apply_env(&|key| (key == "POSTSIEVE_SEMANTIC_THRESHOLD").then(|| "0.8".to_string()));
        assert!(approx_eq(config.semantic_threshold, 0.8));
    }

    #[test_case("NaN" ; "nan")]
    #[test_case("inf" ; "infinite")]
    #[test_case("1.5" ; "above one")]
    #[test_case("-0.1" ; "negative")]
    fn test_unusable_env_threshold_ignored(value: &str) {
        let mut config = DeduplicationConfig::default();
        config.apply_env(&|key| (key == "POSTSIEVE_SEMANTIC_THRESHOLD").then(|| value.to_string()));
        assert!(approx_eq(config.semantic_threshold, DEFAULT_SEMANTIC_THRESHOLD));
    }

    #[test]
    fn test_threshold_bounds_are_inclusive() {
        assert_eq!(checked_threshold("test", 0.0), Some(0.0));
        assert_eq!(checked_threshold("test", 1.0), Some(1.0));
        assert_eq!(checked_threshold("test", f32::NAN), None);
    }
}
