//! Response shapes for the `YouTube` Data API v3 endpoints we call.
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! payload is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Generic `{ items: [...], nextPageToken, pageInfo }` list envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub total_results: u64,
}

/// One `search.list` hit. Only video hits carry `id.videoId`.
#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemId {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatisticsDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// The API reports counts as decimal strings and omits hidden ones.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatisticsDto {
    #[serde(default, deserialize_with = "u64_from_string")]
    pub view_count: u64,
    #[serde(default, deserialize_with = "u64_from_string")]
    pub like_count: u64,
    #[serde(default, deserialize_with = "u64_from_string")]
    pub comment_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct CommentThreadItem {
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
pub struct TopLevelComment {
    pub snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    #[serde(default)]
    pub author_display_name: String,
    pub text_original: Option<String>,
    #[serde(default)]
    pub text_display: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl CommentSnippet {
    /// Prefer the unformatted original text, fall back to the display text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text_original.as_deref().unwrap_or(&self.text_display)
    }
}

/// Google API error envelope: `{ "error": { code, message, errors: [{reason}] } }`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    #[must_use]
    pub fn first_reason(&self) -> &str {
        self.errors.first().map_or("", |d| d.reason.as_str())
    }
}

fn u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Text(String),
        Number(u64),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}
