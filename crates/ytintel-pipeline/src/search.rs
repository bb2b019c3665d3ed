//! Live topic search and market analysis.
//!
//! Unlike single-video reports these are not cached: every call runs one
//! search under the video-data budget, with the same bounded retries as a
//! video fetch.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use ytintel_core::search::watch_url;
use ytintel_core::{
    MarketAnalysis, RankedVideo, SearchOrder, SearchQuery, SearchReport, SearchResults,
    VideoSearch,
};
use ytintel_signals::{analyze_market, categorize, engagement_rate};

use crate::error::PipelineError;
use crate::quota::{Dependency, QuotaGovernor};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};

/// Video-data units per search: one `search.list` (100) plus one
/// `videos.list` (1).
pub const SEARCH_COST: u64 = 101;

/// Longest look-back a market analysis accepts.
pub const MAX_TIMEFRAME_DAYS: u32 = 3_650;

#[derive(Clone)]
pub struct SearchService {
    search: Arc<dyn VideoSearch>,
    governor: QuotaGovernor,
    retry: RetryPolicy,
}

impl SearchService {
    #[must_use]
    pub fn new(search: Arc<dyn VideoSearch>, governor: QuotaGovernor, retry: RetryPolicy) -> Self {
        Self {
            search,
            governor,
            retry,
        }
    }

    /// Run `query` and rank the hits with their engagement and category.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::QuotaExceeded`] when the video-data budget cannot
    ///   cover [`SEARCH_COST`].
    /// - [`PipelineError::UpstreamUnavailable`] when the search still fails
    ///   after its retries.
    /// - [`PipelineError::Cancelled`] when `cancel` fires first.
    pub async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchReport, PipelineError> {
        let span = tracing::info_span!("search", run_id = %Uuid::new_v4(), query = query.query());
        async {
            let results = self.run_search(query, cancel).await?;
            let report = rank(query, results);
            tracing::info!(videos_found = report.videos_found, "search produced");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Sample the most viewed videos on `topic` from the last
    /// `timeframe_days` and summarise them as a market.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidRequest`] for a blank topic, a zero sample,
    ///   or a timeframe outside `1..=`[`MAX_TIMEFRAME_DAYS`].
    /// - [`PipelineError::NotFound`] when the search has no hits.
    /// - Otherwise as [`SearchService::search`].
    pub async fn analyze_market(
        &self,
        topic: &str,
        timeframe_days: u32,
        sample_size: u32,
        cancel: &CancellationToken,
    ) -> Result<MarketAnalysis, PipelineError> {
        if !(1..=MAX_TIMEFRAME_DAYS).contains(&timeframe_days) {
            return Err(PipelineError::InvalidRequest(format!(
                "timeframe_days must be between 1 and {MAX_TIMEFRAME_DAYS}"
            )));
        }
        let since = Utc::now() - TimeDelta::days(i64::from(timeframe_days));
        let query = SearchQuery::new(topic, sample_size)
            .map_err(|e| PipelineError::InvalidRequest(e.message))?
            .with_order(SearchOrder::ViewCount)
            .published_after(since);

        let span = tracing::info_span!("market", run_id = %Uuid::new_v4(), topic = query.query());
        async {
            let results = self.run_search(&query, cancel).await?;
            if results.videos.is_empty() {
                return Err(PipelineError::NotFound(format!(
                    "no videos found for topic '{}'",
                    query.query()
                )));
            }
            let analysis = analyze_market(query.query(), &results.videos, Utc::now());
            tracing::info!(
                videos_analyzed = analysis.videos_analyzed,
                competition = ?analysis.competition_level,
                "market analysis produced"
            );
            Ok(analysis)
        }
        .instrument(span)
        .await
    }

    async fn run_search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResults, PipelineError> {
        retry_with_backoff(&self.retry, cancel, move || async move {
            let token = self.governor.acquire(Dependency::VideoData, SEARCH_COST)?;
            let found = self.search.search_videos(query).await;
            self.governor.release(token);
            found.map_err(PipelineError::from)
        })
        .await
        .map_err(|err| match err {
            RetryError::Cancelled => PipelineError::Cancelled,
            RetryError::Failed(err) => err,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn rank(query: &SearchQuery, results: SearchResults) -> SearchReport {
    let videos: Vec<RankedVideo> = results
        .videos
        .into_iter()
        .map(|v| RankedVideo {
            url: watch_url(&v.video_id),
            engagement_rate: engagement_rate(&v.statistics),
            category: categorize(&v.title, &v.description),
            video_id: v.video_id,
            title: v.title,
            channel: v.channel_title,
            views: v.statistics.view_count,
            likes: v.statistics.like_count,
            comments: v.statistics.comment_count,
            published_at: v.published_at,
        })
        .collect();

    let average_engagement = if videos.is_empty() {
        0.0
    } else {
        videos.iter().map(|v| v.engagement_rate).sum::<f64>() / videos.len() as f64
    };

    SearchReport {
        query: query.query().to_owned(),
        order: query.order(),
        total_results: results.total_results,
        videos_found: videos.len(),
        average_engagement,
        videos,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ytintel_core::{
        CompetitionLevel, ErrorKind, FetchError, VideoCategory, VideoStatistics, VideoSummary,
    };

    use super::*;

    struct FakeSearch {
        calls: AtomicUsize,
        failure: Option<FetchError>,
        videos: Vec<VideoSummary>,
        last_query: Mutex<Option<SearchQuery>>,
    }

    impl FakeSearch {
        fn with(videos: Vec<VideoSummary>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failure: None,
                videos,
                last_query: Mutex::new(None),
            }
        }

        fn failing(err: FetchError) -> Self {
            Self {
                failure: Some(err),
                ..Self::with(Vec::new())
            }
        }
    }

    #[async_trait]
    impl VideoSearch for FakeSearch {
        async fn search_videos(&self, query: &SearchQuery) -> Result<SearchResults, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.clone());
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(SearchResults {
                total_results: 999,
                videos: self.videos.clone(),
            })
        }
    }

    fn summary(id: &str, title: &str, channel: &str, views: u64, likes: u64) -> VideoSummary {
        VideoSummary {
            video_id: id.to_owned(),
            title: title.to_owned(),
            channel_title: channel.to_owned(),
            description: String::new(),
            published_at: None,
            statistics: VideoStatistics {
                view_count: views,
                like_count: likes,
                comment_count: 0,
            },
        }
    }

    fn service(search: &Arc<FakeSearch>, governor: &QuotaGovernor) -> SearchService {
        let search: Arc<dyn VideoSearch> = search.clone();
        SearchService::new(
            search,
            governor.clone(),
            RetryPolicy {
                max_retries: 2,
                backoff_base_ms: 10,
                attempt_timeout: None,
            },
        )
    }

    fn video_units_used(governor: &QuotaGovernor) -> u64 {
        governor
            .snapshot()
            .into_iter()
            .find(|s| s.dependency == Dependency::VideoData)
            .map(|s| s.used)
            .unwrap()
    }

    #[tokio::test]
    async fn search_ranks_hits_with_engagement_and_category() {
        let fake = Arc::new(FakeSearch::with(vec![
            summary("a1", "Sourdough tutorial", "Bake Lab", 1_000, 100),
            summary("b1", "Crumb shots", "Crumb Club", 1_000, 20),
        ]));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);
        let query = SearchQuery::new("sourdough", 10).unwrap();

        let report = service(&fake, &governor)
            .search(&query, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.query, "sourdough");
        assert_eq!(report.total_results, 999);
        assert_eq!(report.videos_found, 2);
        assert_eq!(report.videos[0].url, "https://youtube.com/watch?v=a1");
        assert_eq!(report.videos[0].category, VideoCategory::Education);
        assert!((report.videos[0].engagement_rate - 0.1).abs() < 1e-12);
        assert!((report.average_engagement - 0.06).abs() < 1e-12);
        assert_eq!(video_units_used(&governor), SEARCH_COST);
    }

    #[tokio::test]
    async fn search_needs_the_full_cost_in_budget() {
        let fake = Arc::new(FakeSearch::with(Vec::new()));
        let governor = QuotaGovernor::with_limits(SEARCH_COST - 1, 100_000);
        let query = SearchQuery::new("sourdough", 10).unwrap();

        let err = service(&fake, &governor)
            .search(&query, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_search_failures_are_retried() {
        let fake = Arc::new(FakeSearch::failing(FetchError::Unavailable("503".into())));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);
        let query = SearchQuery::new("sourdough", 10).unwrap();

        let err = service(&fake, &governor)
            .search(&query, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
        assert_eq!(video_units_used(&governor), 3 * SEARCH_COST);
    }

    #[tokio::test]
    async fn cancelled_search_makes_no_call() {
        let fake = Arc::new(FakeSearch::with(Vec::new()));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service(&fake, &governor)
            .search(&SearchQuery::new("sourdough", 10).unwrap(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn market_searches_recent_videos_by_view_count() {
        let fake = Arc::new(FakeSearch::with(vec![
            summary("a1", "Great sourdough tutorial", "Bake Lab", 10_000, 800),
            summary("b1", "Open crumb", "Crumb Club", 50_000, 1_000),
        ]));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);

        let market = service(&fake, &governor)
            .analyze_market(" sourdough ", 30, 25, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(market.topic, "sourdough");
        assert_eq!(market.videos_analyzed, 2);
        assert_eq!(market.top_videos[0].video_id, "b1");
        assert_eq!(market.competition_level, CompetitionLevel::Low);

        let sent = fake.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(sent.order(), SearchOrder::ViewCount);
        assert_eq!(sent.max_results(), 25);
        let since = sent.published_after_at().unwrap();
        let age = Utc::now() - since;
        assert!(age >= TimeDelta::days(30) && age < TimeDelta::days(31));
    }

    #[tokio::test]
    async fn market_without_hits_is_not_found() {
        let fake = Arc::new(FakeSearch::with(Vec::new()));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);

        let err = service(&fake, &governor)
            .analyze_market("zzzz", 30, 50, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn market_rejects_bad_arguments_without_searching() {
        let fake = Arc::new(FakeSearch::with(Vec::new()));
        let governor = QuotaGovernor::with_limits(10_000, 100_000);
        let svc = service(&fake, &governor);
        let cancel = CancellationToken::new();

        for (topic, days, sample) in [("", 30, 10), ("bread", 0, 10), ("bread", 30, 0), ("bread", 9_999, 10)] {
            let err = svc.analyze_market(topic, days, sample, &cancel).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{topic} {days} {sample}");
        }
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }
}
