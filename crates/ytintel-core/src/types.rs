use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Longest video id accepted from callers.
const MAX_VIDEO_ID_LEN: usize = 64;

/// How much of a video the platform fetch should pull.
///
/// Depth gates fetch scope only. Whether a depth is also eligible for LLM
/// enrichment is a separate, configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDepth {
    MetadataOnly,
    MetadataAndComments,
    Full,
}

impl FetchDepth {
    pub const ALL: [FetchDepth; 3] = [
        FetchDepth::MetadataOnly,
        FetchDepth::MetadataAndComments,
        FetchDepth::Full,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FetchDepth::MetadataOnly => "metadata_only",
            FetchDepth::MetadataAndComments => "metadata_and_comments",
            FetchDepth::Full => "full",
        }
    }

    #[must_use]
    pub fn includes_comments(self) -> bool {
        match self {
            FetchDepth::MetadataOnly => false,
            FetchDepth::MetadataAndComments | FetchDepth::Full => true,
        }
    }

    #[must_use]
    pub fn includes_transcript(self) -> bool {
        match self {
            FetchDepth::MetadataOnly | FetchDepth::MetadataAndComments => false,
            FetchDepth::Full => true,
        }
    }

    /// Video-data quota units charged per fetch attempt at this depth.
    #[must_use]
    pub fn fetch_cost(self) -> u64 {
        match self {
            FetchDepth::MetadataOnly => 1,
            FetchDepth::MetadataAndComments => 2,
            FetchDepth::Full => 3,
        }
    }
}

impl fmt::Display for FetchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metadata_only" | "metadata" => Ok(FetchDepth::MetadataOnly),
            "metadata_and_comments" | "comments" => Ok(FetchDepth::MetadataAndComments),
            "full" => Ok(FetchDepth::Full),
            other => Err(format!(
                "unknown depth '{other}' (expected metadata_only, metadata_and_comments, or full)"
            )),
        }
    }
}

/// A single analysis request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    video_id: String,
    requested_depth: FetchDepth,
}

impl VideoRequest {
    /// Build a request from a bare video id or a `YouTube` URL.
    ///
    /// Accepts `watch?v=`, `youtu.be/<id>`, `/shorts/<id>`, and `/embed/<id>`
    /// forms, with or without a scheme.
    ///
    /// # Errors
    ///
    /// Returns an `invalid_request` [`ToolError`] if no id can be extracted
    /// or the id contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(reference: &str, requested_depth: FetchDepth) -> Result<Self, ToolError> {
        let reference = reference.trim();
        let candidate = if reference.contains("://") {
            video_id_from_url(reference)
        } else if reference.contains(['/', '?']) {
            // Scheme-less URL such as `youtu.be/<id>`; bare ids never contain these.
            video_id_from_url(&format!("https://{reference}"))
        } else {
            Some(reference.to_string())
        }
        .ok_or_else(|| {
            ToolError::invalid_request(format!("no video id found in URL '{reference}'"))
        })?;

        if !is_valid_video_id(&candidate) {
            return Err(ToolError::invalid_request(format!(
                "invalid video id '{candidate}'"
            )));
        }

        Ok(Self {
            video_id: candidate,
            requested_depth,
        })
    }

    #[must_use]
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    #[must_use]
    pub fn requested_depth(&self) -> FetchDepth {
        self.requested_depth
    }
}

fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn video_id_from_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    if host == "youtu.be" {
        return url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    if host != "youtube.com" && !host.ends_with(".youtube.com") {
        return None;
    }

    if url.path() == "/watch" {
        return url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned());
    }

    let mut segments = url.path_segments()?;
    match segments.next()? {
        "shorts" | "embed" | "live" => segments
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatistics {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Everything fetched from the platform for one orchestration run.
///
/// Owned by a single run and dropped once signals are derived; never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVideoData {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    pub statistics: VideoStatistics,
    pub comments: Vec<Comment>,
    pub transcript: Option<Vec<String>>,
}

impl RawVideoData {
    /// Concatenated free text handed to the enricher.
    #[must_use]
    pub fn raw_text(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.description);
        for comment in &self.comments {
            text.push('\n');
            text.push_str(&comment.text);
        }
        if let Some(segments) = &self.transcript {
            text.push('\n');
            text.push_str(&segments.join(" "));
        }
        text
    }
}

/// Coarse topic bucket derived from a video's title and description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCategory {
    Education,
    Entertainment,
    Technology,
    Gaming,
    Music,
    News,
    Sports,
    #[default]
    Other,
}

impl VideoCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VideoCategory::Education => "education",
            VideoCategory::Entertainment => "entertainment",
            VideoCategory::Technology => "technology",
            VideoCategory::Gaming => "gaming",
            VideoCategory::Music => "music",
            VideoCategory::News => "news",
            VideoCategory::Sports => "sports",
            VideoCategory::Other => "other",
        }
    }
}

impl fmt::Display for VideoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic, locally derived signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    /// Mean polarity in `[-1, 1]`.
    pub sentiment_score: f64,
    /// Mean subjectivity in `[0, 1]`.
    pub subjectivity_score: f64,
    /// `(term, weight)` pairs, heaviest first.
    pub top_keywords: Vec<(String, f64)>,
    pub engagement_rate: f64,
    #[serde(default)]
    pub category: VideoCategory,
}

impl SignalSet {
    /// Signals for a video with no usable text or statistics.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            sentiment_score: 0.0,
            subjectivity_score: 0.0,
            top_keywords: Vec::new(),
            engagement_rate: 0.0,
            category: VideoCategory::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub summary: String,
    pub key_themes: BTreeSet<String>,
    pub confidence: f64,
    pub model_id: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Complete,
    Partial,
    Failed,
}

/// The unit persisted by the report cache and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub video_id: String,
    pub pipeline_version: u32,
    pub requested_depth: FetchDepth,
    pub title: String,
    pub signals: SignalSet,
    pub insight: Option<Insight>,
    pub fetched_at: DateTime<Utc>,
    pub status: ReportStatus,
}
