//! HTTP client for the `YouTube` Data API v3 and the timed-text endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use ytintel_core::{
    Comment, FetchDepth, FetchError, RawVideoData, SearchQuery, SearchResults, VideoSearch,
    VideoSource, VideoStatistics, VideoSummary,
};

use crate::error::YoutubeError;
use crate::transcript::parse_timedtext;
use crate::types::{CommentThreadItem, ErrorEnvelope, ListResponse, SearchItem, VideoItem};

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
const DEFAULT_TIMEDTEXT_BASE: &str = "https://www.youtube.com/";

/// Page size cap enforced by `commentThreads.list`.
const MAX_PAGE_SIZE: usize = 100;

/// Upper bound on `commentThreads.list` pages followed for one video.
pub const MAX_COMMENT_PAGES: usize = 50;

/// Reasons in a 403 body that mean the key's budget is spent.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

/// Client for the `YouTube` Data API.
///
/// Use [`YoutubeClient::new`] for production or
/// [`YoutubeClient::with_base_urls`] to point at mock servers in tests.
pub struct YoutubeClient {
    client: Client,
    api_key: String,
    api_base: String,
    timedtext_base: String,
    max_comments: usize,
}

impl YoutubeClient {
    /// Creates a client pointed at the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, max_comments: usize) -> Result<Self, YoutubeError> {
        Self::with_base_urls(
            api_key,
            timeout_secs,
            max_comments,
            DEFAULT_API_BASE,
            DEFAULT_TIMEDTEXT_BASE,
        )
    }

    /// Creates a client with custom base URLs (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`YoutubeError::InvalidUrl`] if either base is not a URL.
    pub fn with_base_urls(
        api_key: &str,
        timeout_secs: u64,
        max_comments: usize,
        api_base: &str,
        timedtext_base: &str,
    ) -> Result<Self, YoutubeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ytintel/0.1 (video-intelligence)")
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            api_base: normalise_base(api_base)?,
            timedtext_base: normalise_base(timedtext_base)?,
            max_comments,
        })
    }

    /// Fetches snippet and statistics for one video via `videos.list`.
    ///
    /// # Errors
    ///
    /// - [`YoutubeError::NotFound`] if the API returns no items.
    /// - [`YoutubeError::QuotaExceeded`] when the key's quota is spent.
    /// - [`YoutubeError::Http`] / [`YoutubeError::Api`] on transport or HTTP failure.
    pub async fn get_video(&self, video_id: &str) -> Result<VideoItem, YoutubeError> {
        let url = self.api_url(
            "videos",
            &[("part", "snippet,statistics"), ("id", video_id)],
        )?;
        let list: ListResponse<VideoItem> =
            self.request_json(url, &format!("videos(id={video_id})")).await?;

        list.items
            .into_iter()
            .find(|item| item.id == video_id)
            .ok_or_else(|| YoutubeError::NotFound(video_id.to_owned()))
    }

    /// Fetches up to `max_comments` top-level comments, most relevant first.
    ///
    /// Follows `nextPageToken` until the cap is reached. A video with comments
    /// disabled yields an empty list rather than an error.
    ///
    /// # Errors
    ///
    /// Same as [`YoutubeClient::get_video`], plus
    /// [`YoutubeError::PaginationLimit`] if the API is still handing out page
    /// tokens after [`MAX_COMMENT_PAGES`] pages.
    pub async fn list_comments(&self, video_id: &str) -> Result<Vec<Comment>, YoutubeError> {
        let mut comments = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0usize;

        while comments.len() < self.max_comments {
            page_count += 1;
            if page_count > MAX_COMMENT_PAGES {
                return Err(YoutubeError::PaginationLimit {
                    context: format!("commentThreads(videoId={video_id})"),
                    max_pages: MAX_COMMENT_PAGES,
                });
            }


            let page_size = (self.max_comments - comments.len())
                .min(MAX_PAGE_SIZE)
                .to_string();
            let mut params = vec![
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", page_size.as_str()),
                ("order", "relevance"),
                ("textFormat", "plainText"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let url = self.api_url("commentThreads", &params)?;

            let page: ListResponse<CommentThreadItem> = match self
                .request_json(url, &format!("commentThreads(videoId={video_id})"))
                .await
            {
                Ok(page) => page,
                Err(YoutubeError::Api { status: 403, reason, .. })
                    if reason == "commentsDisabled" =>
                {
                    tracing::warn!(video_id, "comments disabled for video");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };

            comments.extend(page.items.into_iter().map(|item| {
                let snippet = item.snippet.top_level_comment.snippet;
                Comment {
                    author: snippet.author_display_name.clone(),
                    text: snippet.text().to_owned(),
                    published_at: snippet.published_at,
                }
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        comments.truncate(self.max_comments);
        Ok(comments)
    }

    /// Fetches the English timed-text transcript.
    ///
    /// Returns `Ok(None)` when the video has no transcript (empty body or 404).
    ///
    /// # Errors
    ///
    /// [`YoutubeError::Http`] on transport failure, [`YoutubeError::Api`] for
    /// other non-2xx answers, [`YoutubeError::Xml`] for malformed bodies.
    pub async fn get_transcript(&self, video_id: &str) -> Result<Option<Vec<String>>, YoutubeError> {
        let url = Url::parse_with_params(
            &format!("{}api/timedtext", self.timedtext_base),
            &[("v", video_id), ("lang", "en")],
        )
        .map_err(|e| YoutubeError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(YoutubeError::Api {
                status: response.status().as_u16(),
                reason: "timedtext".to_owned(),
                message: "transcript request failed".to_owned(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let segments = parse_timedtext(&body)?;
        Ok(if segments.is_empty() {
            None
        } else {
            Some(segments)
        })
    }

    /// Runs `search.list` for videos, then `videos.list` for their statistics.
    ///
    /// Hits keep the search ranking. Hits that `videos.list` no longer knows
    /// about (deleted between the two calls) are dropped.
    ///
    /// # Errors
    ///
    /// Same as [`YoutubeClient::get_video`].
    pub async fn search_videos(&self, query: &SearchQuery) -> Result<SearchResults, YoutubeError> {
        let max_results = query.max_results().to_string();
        let published_after = query
            .published_after_at()
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true));

        let mut params = vec![
            ("part", "snippet"),
            ("type", "video"),
            ("q", query.query()),
            ("maxResults", max_results.as_str()),
            ("order", query.order().as_api_str()),
        ];
        if let Some(region) = query.region_code() {
            params.push(("regionCode", region));
        }
        if let Some(after) = published_after.as_deref() {
            params.push(("publishedAfter", after));
        }
        let url = self.api_url("search", &params)?;
        let hits: ListResponse<SearchItem> = self
            .request_json(url, &format!("search(q={})", query.query()))
            .await?;

        let total_results = hits.page_info.total_results;
        let ids: Vec<String> = hits
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();
        if ids.is_empty() {
            return Ok(SearchResults {
                total_results,
                videos: Vec::new(),
            });
        }

        let joined = ids.join(",");
        let url = self.api_url("videos", &[("part", "snippet,statistics"), ("id", &joined)])?;
        let details: ListResponse<VideoItem> =
            self.request_json(url, "videos(search hits)").await?;
        let mut by_id: HashMap<String, VideoItem> = details
            .items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let videos: Vec<VideoSummary> = ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(summarize)
            .collect();

        tracing::debug!(
            query = query.query(),
            total_results,
            returned = videos.len(),
            "search complete"
        );
        Ok(SearchResults {
            total_results,
            videos,
        })
    }

    fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, YoutubeError> {
        let mut url = Url::parse(&format!("{}{endpoint}", self.api_base))
            .map_err(|e| YoutubeError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    /// Sends a GET, maps non-2xx answers onto typed errors, and decodes JSON.
    async fn request_json<T: DeserializeOwned>(
        &self,
        url: Url,
        context: &str,
    ) -> Result<T, YoutubeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status, &body, context));
        }

        serde_json::from_str(&body).map_err(|e| YoutubeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

fn statistics(item: &VideoItem) -> VideoStatistics {
    VideoStatistics {
        view_count: item.statistics.view_count,
        like_count: item.statistics.like_count,
        comment_count: item.statistics.comment_count,
    }
}

fn summarize(item: VideoItem) -> VideoSummary {
    let statistics = statistics(&item);
    VideoSummary {
        video_id: item.id,
        title: item.snippet.title,
        channel_title: item.snippet.channel_title,
        description: item.snippet.description,
        published_at: item.snippet.published_at,
        statistics,
    }
}

fn normalise_base(base: &str) -> Result<String, YoutubeError> {
    let normalised = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&normalised)
        .map_err(|e| YoutubeError::InvalidUrl(format!("invalid base URL '{base}': {e}")))?;
    Ok(normalised)
}

fn classify_error(status: StatusCode, body: &str, context: &str) -> YoutubeError {
    let (reason, message) = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| (String::new(), body.chars().take(200).collect()),
        |env| (env.error.first_reason().to_owned(), env.error.message),
    );

    if status == StatusCode::NOT_FOUND || reason == "videoNotFound" {
        return YoutubeError::NotFound(context.to_owned());
    }
    if status == StatusCode::FORBIDDEN && QUOTA_REASONS.contains(&reason.as_str()) {
        return YoutubeError::QuotaExceeded(message);
    }

    YoutubeError::Api {
        status: status.as_u16(),
        reason,
        message,
    }
}

#[async_trait]
impl VideoSource for YoutubeClient {
    async fn fetch_video_data(
        &self,
        video_id: &str,
        depth: FetchDepth,
    ) -> Result<RawVideoData, FetchError> {
        let video = self.get_video(video_id).await?;

        let comments = if depth.includes_comments() {
            self.list_comments(video_id).await?
        } else {
            Vec::new()
        };

        let transcript = if depth.includes_transcript() {
            match self.get_transcript(video_id).await {
                Ok(segments) => segments,
                Err(e) => {
                    tracing::warn!(video_id, error = %e, "transcript unavailable, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            video_id,
            depth = %depth,
            comments = comments.len(),
            transcript_segments = transcript.as_ref().map_or(0, Vec::len),
            "fetched video data"
        );

        let statistics = statistics(&video);
        Ok(RawVideoData {
            video_id: video.id,
            title: video.snippet.title,
            description: video.snippet.description,
            published_at: video.snippet.published_at,
            statistics,
            comments,
            transcript,
        })
    }
}

#[async_trait]
impl VideoSearch for YoutubeClient {
    async fn search_videos(&self, query: &SearchQuery) -> Result<SearchResults, FetchError> {
        Ok(YoutubeClient::search_videos(self, query).await?)
    }
}
