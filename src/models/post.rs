//! Candidate post records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Link preview attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    /// Target URL of the preview card.
    #[serde(default)]
    pub url: Option<String>,
    /// Thumbnail shown on the preview card.
    #[serde(default, alias = "photo")]
    pub photo_url: Option<String>,
}

/// A candidate post flowing through one pipeline run.
///
/// Posts are created fresh from each input batch. The stages annotate them
/// (`content_hash`, `embedding_raw`, `rewritten_text`) but never persist the
/// record itself; persistence converts an approved post into a history row.
///
/// # Example
///
/// ```rust
/// use postsieve::models::Post;
///
/// let post = Post::new("Road closed on Main St.", "https://vk.com/wall-1_10")
///     .with_group_name("city-news")
///     .with_video_urls(vec!["https://vk.com/video-1_5".to_string()]);
///
/// assert!(post.has_attachments());
/// assert!(post.is_publishable());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Current text. Replaced by the published version after rewriting.
    pub text: String,
    /// Canonical source URL used as the identity key.
    #[serde(default, alias = "post_url", alias = "original_post_url")]
    pub source_url: String,
    /// Name of the group the post was scraped from.
    #[serde(default)]
    pub group_name: String,
    /// Original publication time.
    #[serde(default, alias = "date", with = "post_date_format")]
    pub post_date: Option<NaiveDateTime>,
    /// Photo attachments.
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// GIF attachments.
    #[serde(default)]
    pub gif_urls: Vec<String>,
    /// Video attachments.
    #[serde(default)]
    pub video_urls: Vec<String>,
    /// Optional link preview card.
    #[serde(default)]
    pub link_preview: Option<LinkPreview>,
    /// SHA256 fingerprint of the trimmed text, set once by the fingerprint stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Embedding of the raw text, set once by the semantic stage.
    #[serde(default, skip_serializing)]
    pub embedding_raw: Option<Vec<f32>>,
    /// Accepted rewrite of the text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_text: Option<String>,
    /// Pre-rewrite text, captured by the rewrite stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl Post {
    /// Creates a post with text and source URL.
    #[must_use]
    pub fn new(text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_url: source_url.into(),
            ..Self::default()
        }
    }

    /// Sets the group name.
    #[must_use]
    pub fn with_group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    /// Sets the publication time.
    #[must_use]
    pub const fn with_post_date(mut self, date: NaiveDateTime) -> Self {
        self.post_date = Some(date);
        self
    }

    /// Sets the photo attachments.
    #[must_use]
    pub fn with_media_urls(mut self, urls: Vec<String>) -> Self {
        self.media_urls = urls;
        self
    }

    /// Sets the GIF attachments.
    #[must_use]
    pub fn with_gif_urls(mut self, urls: Vec<String>) -> Self {
        self.gif_urls = urls;
        self
    }

    /// Sets the video attachments.
    #[must_use]
    pub fn with_video_urls(mut self, urls: Vec<String>) -> Self {
        self.video_urls = urls;
        self
    }

    /// Sets the link preview.
    #[must_use]
    pub fn with_link_preview(mut self, preview: LinkPreview) -> Self {
        self.link_preview = Some(preview);
        self
    }

    /// Returns true if any photo, GIF or video is attached.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.media_urls.is_empty() || !self.gif_urls.is_empty() || !self.video_urls.is_empty()
    }

    /// Returns the link preview target URL, if present and non-empty.
    #[must_use]
    pub fn link_preview_url(&self) -> Option<&str> {
        self.link_preview
            .as_ref()
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Returns the link preview thumbnail URL, if present and non-empty.
    #[must_use]
    pub fn link_preview_photo(&self) -> Option<&str> {
        self.link_preview
            .as_ref()
            .and_then(|p| p.photo_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Returns false for posts with nothing to publish.
    ///
    /// A post needs non-blank text, a photo, a video, or a link-preview photo.
    /// GIFs alone do not make a post publishable.
    #[must_use]
    pub fn is_publishable(&self) -> bool {
        !self.text.trim().is_empty()
            || !self.media_urls.is_empty()
            || !self.video_urls.is_empty()
            || self.link_preview_photo().is_some()
    }

    /// Returns the pre-rewrite text.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        self.original_text.as_deref().unwrap_or(&self.text)
    }
}

/// Serde adapter for `post_date`.
///
/// Writes `%Y-%m-%d %H:%M:%S` and accepts that format, ISO-8601 with a `T`
/// separator, or an RFC 3339 timestamp with offset (converted to UTC).
pub(crate) mod post_date_format {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse(raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized post date: {raw}")))
    }

    pub(crate) fn parse(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
    }
}
