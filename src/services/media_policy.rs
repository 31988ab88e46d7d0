//! Video size policy.

use crate::Result;
use crate::config::MediaConfig;
use crate::media::SizeProbe;
use crate::models::{Post, SkipEvent, SkipReason};
use crate::services::deduplication::{FilterStage, StageOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// What the probe said about one video.
#[derive(Debug, Clone, Copy, PartialEq)]
enum VideoVerdict {
    /// At or under the limit, or of unknown size.
    Acceptable,
    /// Measured above the limit.
    Oversized(f64),
    /// The probe failed; treated as oversized.
    Unmeasurable,
}

/// Rejects posts carrying a video over the size limit.
///
/// One oversized video disqualifies the whole post. An unknown size passes;
/// a failed probe counts as oversized.
pub struct MediaPolicyFilter {
    probe: Arc<dyn SizeProbe>,
    max_video_size_mb: f64,
}

impl MediaPolicyFilter {
    /// Creates a new media policy filter.
    #[must_use]
    pub fn new(probe: Arc<dyn SizeProbe>, config: &MediaConfig) -> Self {
        Self {
            probe,
            max_video_size_mb: config.max_video_size_mb,
        }
    }

    fn inspect(&self, url: &str) -> VideoVerdict {
        match self.probe.probe_size_mb(url) {
            Ok(Some(size)) if size > self.max_video_size_mb => VideoVerdict::Oversized(size),
            Ok(Some(size)) if size > 0.0 => VideoVerdict::Acceptable,
            Ok(_) => {
                tracing::info!(video_url = %url, "Video size unknown, allowing");
                VideoVerdict::Acceptable
            },
            Err(e) => {
                tracing::error!(video_url = %url, error = %e, "Video size probe failed");
                VideoVerdict::Unmeasurable
            },
        }
    }

    /// Returns the first video of `post` that breaks the policy.
    fn first_violation<'a>(&self, post: &'a Post) -> Option<(&'a str, VideoVerdict)> {
        post.video_urls
            .iter()
            .map(|url| (url.as_str(), self.inspect(url)))
            .find(|(_, verdict)| *verdict != VideoVerdict::Acceptable)
    }
}

impl FilterStage for MediaPolicyFilter {
    fn name(&self) -> &'static str {
        "media_policy"
    }

    #[instrument(
        skip(self, posts),
        fields(operation = "media_policy", batch = posts.len(), limit_mb = self.max_video_size_mb)
    )]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome> {
        let start = Instant::now();
        let mut outcome = StageOutcome::with_capacity(posts.len());

        for post in posts {
            match self.first_violation(&post) {
                None => outcome.pass(post),
                Some((video_url, verdict)) => {
                    match verdict {
                        VideoVerdict::Oversized(size) => tracing::warn!(
                            source_url = %post.source_url,
                            video_url = %video_url,
                            size_mb = size,
                            "Video over size limit"
                        ),
                        _ => tracing::warn!(
                            source_url = %post.source_url,
                            video_url = %video_url,
                            "Video could not be measured, rejecting post"
                        ),
                    }
                    outcome.skip(SkipEvent::new(&post, SkipReason::VideoTooLarge));
                },
            }
        }

        metrics::histogram!("dedup_filter_duration_ms", "filter" => "media_policy")
            .record(start.elapsed().as_millis() as f64);

        Ok(outcome)
    }
}
