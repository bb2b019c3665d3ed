//! Topic search and market-analysis data model.
//!
//! Search results are never cached: they are a live view of the platform,
//! charged against the video-data budget on every call.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::types::{VideoCategory, VideoStatistics};

/// Largest page `search.list` returns.
pub const MAX_SEARCH_RESULTS: u32 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    #[default]
    Relevance,
    Date,
    Rating,
    ViewCount,
}

impl SearchOrder {
    /// The value the platform API expects for `order`.
    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            SearchOrder::Relevance => "relevance",
            SearchOrder::Date => "date",
            SearchOrder::Rating => "rating",
            SearchOrder::ViewCount => "viewCount",
        }
    }
}

impl fmt::Display for SearchOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for SearchOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(SearchOrder::Relevance),
            "date" => Ok(SearchOrder::Date),
            "rating" => Ok(SearchOrder::Rating),
            "viewcount" | "view_count" => Ok(SearchOrder::ViewCount),
            other => Err(format!(
                "unknown order '{other}' (expected relevance, date, rating, or viewCount)"
            )),
        }
    }
}

/// A validated topic search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    query: String,
    max_results: u32,
    order: SearchOrder,
    region_code: Option<String>,
    published_after: Option<DateTime<Utc>>,
}

impl SearchQuery {
    /// # Errors
    ///
    /// Returns an `invalid_request` [`ToolError`] for a blank query or a zero
    /// result count. Counts above [`MAX_SEARCH_RESULTS`] are clamped.
    pub fn new(query: &str, max_results: u32) -> Result<Self, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::invalid_request("search query must not be empty"));
        }
        if max_results == 0 {
            return Err(ToolError::invalid_request("max_results must be at least 1"));
        }
        Ok(Self {
            query: query.to_owned(),
            max_results: max_results.min(MAX_SEARCH_RESULTS),
            order: SearchOrder::default(),
            region_code: None,
            published_after: None,
        })
    }

    #[must_use]
    pub fn with_order(mut self, order: SearchOrder) -> Self {
        self.order = order;
        self
    }

    /// # Errors
    ///
    /// Returns an `invalid_request` [`ToolError`] unless `code` is two ASCII
    /// letters.
    pub fn with_region(mut self, code: &str) -> Result<Self, ToolError> {
        let code = code.trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ToolError::invalid_request(format!(
                "invalid region code '{code}'"
            )));
        }
        self.region_code = Some(code.to_ascii_uppercase());
        Ok(self)
    }

    #[must_use]
    pub fn published_after(mut self, at: DateTime<Utc>) -> Self {
        self.published_after = Some(at);
        self
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    #[must_use]
    pub fn order(&self) -> SearchOrder {
        self.order
    }

    #[must_use]
    pub fn region_code(&self) -> Option<&str> {
        self.region_code.as_deref()
    }

    #[must_use]
    pub fn published_after_at(&self) -> Option<DateTime<Utc>> {
        self.published_after
    }
}

/// One search hit with the statistics needed for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    pub statistics: VideoStatistics,
}

/// Hits in platform order plus the platform's estimate of the total.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    pub total_results: u64,
    pub videos: Vec<VideoSummary>,
}

/// A search hit as returned to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVideo {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub engagement_rate: f64,
    pub category: VideoCategory,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub order: SearchOrder,
    pub total_results: u64,
    pub videos_found: usize,
    pub average_engagement: f64,
    pub videos: Vec<RankedVideo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPerformance {
    pub channel: String,
    pub total_views: u64,
    pub average_views: u64,
    pub video_count: usize,
    pub average_engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopVideo {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub views: u64,
}

/// Aggregate view over a sample of videos for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalysis {
    pub topic: String,
    pub videos_analyzed: usize,
    pub total_views: u64,
    pub average_views: u64,
    pub average_engagement: f64,
    pub unique_creators: usize,
    pub competition_level: CompetitionLevel,
    /// Mean title polarity in `[-1, 1]`.
    pub market_sentiment: f64,
    pub dominant_category: VideoCategory,
    pub top_videos: Vec<TopVideo>,
    pub top_channels: Vec<ChannelPerformance>,
    pub insights: Vec<String>,
}

#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn blank_query_is_rejected() {
        let err = SearchQuery::new("   ", 10).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(SearchQuery::new("sourdough", 0).is_err());
    }

    #[test]
    fn result_count_is_clamped() {
        let query = SearchQuery::new(" sourdough ", 500).unwrap();
        assert_eq!(query.query(), "sourdough");
        assert_eq!(query.max_results(), MAX_SEARCH_RESULTS);
    }

    #[test]
    fn region_must_be_two_letters() {
        let query = SearchQuery::new("bread", 5).unwrap();
        assert_eq!(query.clone().with_region("gb").unwrap().region_code(), Some("GB"));
        assert!(query.clone().with_region("GBR").is_err());
        assert!(query.with_region("1a").is_err());
    }

    #[test]
    fn order_parses_api_and_snake_case_forms() {
        assert_eq!("viewCount".parse::<SearchOrder>().unwrap(), SearchOrder::ViewCount);
        assert_eq!("view_count".parse::<SearchOrder>().unwrap(), SearchOrder::ViewCount);
        assert_eq!(SearchOrder::ViewCount.as_api_str(), "viewCount");
        assert!("popular".parse::<SearchOrder>().is_err());
    }
}
