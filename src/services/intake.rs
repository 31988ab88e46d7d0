//! Raw record normalization and publishability check.
//!
//! Scraped records arrive with source markup, hashtags and reposts mixed in.
//! [`IntakeNormalizer`] turns them into clean [`Post`] records, and
//! [`ContentValidator`] is the first pipeline stage, dropping posts with
//! nothing to publish.

use crate::config::IntakeSettings;
use crate::models::{LinkPreview, Post, SkipEvent, SkipReason, post_date_format};
use crate::services::deduplication::{FilterStage, StageOutcome};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

/// `[target|label]` mention markup.
static MENTION_MARKUP: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\[[^\[\]|]+\|([^\[\]]+)\]").ok());

/// Bare links to the source network.
static SOURCE_LINKS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"https?://vk\.com\S*").ok());

/// Hashtags with their leading whitespace.
static HASHTAGS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s*#\S+").ok());

/// A scraped record before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    /// Text with source markup.
    #[serde(default)]
    pub text: String,
    /// Source URL.
    #[serde(default, alias = "source_url")]
    pub post_url: String,
    /// Publication time.
    #[serde(default, alias = "post_date", with = "post_date_format")]
    pub date: Option<NaiveDateTime>,
    /// Source group.
    #[serde(default)]
    pub group_name: String,
    /// True if the record reposts another post.
    #[serde(default)]
    pub is_repost: bool,
    /// Photo attachments.
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// GIF attachments.
    #[serde(default)]
    pub gif_urls: Vec<String>,
    /// Video attachments.
    #[serde(default)]
    pub video_urls: Vec<String>,
    /// Link preview card.
    #[serde(default)]
    pub link_preview: Option<LinkPreview>,
}

/// Result of normalizing a scraped batch.
#[derive(Debug, Clone, Default)]
pub struct IntakeReport {
    /// Normalized posts, ready for the pipeline.
    pub posts: Vec<Post>,
    /// Reposts removed before normalization.
    pub reposts_dropped: usize,
    /// Records left with no content after cleaning.
    pub empty_dropped: usize,
}

/// Cleans post text.
///
/// Unescapes literal `\n`, keeps only the label of `[target|label]` markup,
/// removes source-network links and hashtags, then trims.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut text = text.replace("\\n", "\n").trim().to_string();
    if let Some(re) = MENTION_MARKUP.as_ref() {
        text = re.replace_all(&text, "$1").into_owned();
    }
    if let Some(re) = SOURCE_LINKS.as_ref() {
        text = re.replace_all(&text, "").into_owned();
    }
    if let Some(re) = HASHTAGS.as_ref() {
        text = re.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Turns scraped records into pipeline posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeNormalizer {
    settings: IntakeSettings,
}

impl IntakeNormalizer {
    /// Creates a normalizer with the given settings.
    #[must_use]
    pub const fn new(settings: IntakeSettings) -> Self {
        Self { settings }
    }

    /// Normalizes a scraped batch.
    ///
    /// Groups keep the order of their first appearance. With interleaving on,
    /// posts are taken round-robin across groups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty batch.
    #[instrument(skip(self, raw), fields(operation = "intake", batch = raw.len()))]
    pub fn normalize(&self, raw: Vec<RawPost>) -> Result<IntakeReport> {
        if raw.is_empty() {
            return Err(Error::InvalidInput("batch contains no records".to_string()));
        }

        let mut report = IntakeReport::default();
        let mut groups: Vec<Vec<RawPost>> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for record in raw {
            if self.settings.drop_reposts && record.is_repost {
                report.reposts_dropped += 1;
                continue;
            }
            let slot = *group_index
                .entry(record.group_name.clone())
                .or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
            groups[slot].push(record);
        }

        let ordered: Vec<RawPost> = if self.settings.interleave_groups {
            interleave(groups)
        } else {
            groups.into_iter().flatten().collect()
        };

        for record in ordered {
            match prepare(record) {
                Some(post) => report.posts.push(post),
                None => report.empty_dropped += 1,
            }
        }

        tracing::info!(
            posts = report.posts.len(),
            reposts_dropped = report.reposts_dropped,
            empty_dropped = report.empty_dropped,
            "Batch normalized"
        );
        Ok(report)
    }
}

/// Round-robin across groups.
fn interleave(groups: Vec<Vec<RawPost>>) -> Vec<RawPost> {
    let total = groups.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = groups.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        for iter in &mut iters {
            out.extend(iter.next());
        }
    }
    out
}

fn prepare(record: RawPost) -> Option<Post> {
    let post = Post {
        text: clean_text(&record.text),
        source_url: record.post_url,
        group_name: record.group_name,
        post_date: record.date,
        media_urls: record.media_urls,
        gif_urls: record.gif_urls,
        video_urls: record.video_urls,
        link_preview: record.link_preview,
        ..Post::default()
    };

    if !post.is_publishable() {
        tracing::debug!(
            group = %post.group_name,
            source_url = %post.source_url,
            "Dropping empty record"
        );
        return None;
    }
    Some(post)
}

/// Drops posts with nothing to publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentValidator;

impl FilterStage for ContentValidator {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process(&self, posts: Vec<Post>) -> Result<StageOutcome> {
        let mut outcome = StageOutcome::with_capacity(posts.len());
        for post in posts {
            if post.is_publishable() {
                outcome.pass(post);
            } else {
                outcome.skip(SkipEvent::new(&post, SkipReason::EmptyContent));
            }
        }
        Ok(outcome)
    }
}
