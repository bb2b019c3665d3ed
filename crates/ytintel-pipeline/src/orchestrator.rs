//! Turns a [`VideoRequest`] into a cached [`IntelligenceReport`].
//!
//! 1. Look the key up in the cache; a hit makes no external calls.
//! 2. On a miss, take the key's lease or wait for the run that holds it.
//! 3. As leader, re-check the cache, then fetch under the video-data budget
//!    with bounded retries.
//! 4. Extract signals locally.
//! 5. Enrich when the depth is eligible, the enricher is configured, and the
//!    LLM budget allows. Any enrichment failure degrades the report to
//!    partial instead of failing the request.
//! 6. Store the report, release the lease, return it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use ytintel_core::{
    AppConfig, CacheKey, FetchDepth, Insight, IntelligenceReport, RawVideoData, ReportStatus,
    SignalSet, VideoRequest, VideoSource,
};
use ytintel_signals::{SignalExtractor, PIPELINE_VERSION};

use crate::cache::{Lease, LeaseOutcome, ReportCache, WaitOutcome};
use crate::enricher::{build_prompt, InsightEnricher};
use crate::error::PipelineError;
use crate::quota::{Dependency, QuotaGovernor};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub pipeline_version: u32,
    /// Depths whose reports get an LLM insight.
    pub enrich_depths: Vec<FetchDepth>,
    pub fetch_retry: RetryPolicy,
    pub llm_timeout: Duration,
    pub top_keywords: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pipeline_version: PIPELINE_VERSION,
            enrich_depths: vec![FetchDepth::Full],
            fetch_retry: RetryPolicy::default(),
            llm_timeout: Duration::from_secs(30),
            top_keywords: ytintel_signals::extractor::DEFAULT_TOP_K,
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            pipeline_version: PIPELINE_VERSION,
            enrich_depths: config.enrich_depths.clone(),
            fetch_retry: RetryPolicy {
                max_retries: config.fetch_max_retries,
                backoff_base_ms: config.retry_backoff_base_ms,
                attempt_timeout: Some(Duration::from_secs(config.youtube_timeout_secs)),
            },
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
            top_keywords: config.top_keywords,
        }
    }
}

pub struct AnalysisOrchestrator {
    source: Arc<dyn VideoSource>,
    enricher: Option<InsightEnricher>,
    cache: ReportCache,
    governor: QuotaGovernor,
    extractor: SignalExtractor,
    config: OrchestratorConfig,
}

impl AnalysisOrchestrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn VideoSource>,
        enricher: Option<InsightEnricher>,
        cache: ReportCache,
        governor: QuotaGovernor,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            enricher,
            cache,
            governor,
            extractor: SignalExtractor::new(config.top_keywords),
            config,
        }
    }

    #[must_use]
    pub fn governor(&self) -> &QuotaGovernor {
        &self.governor
    }

    #[must_use]
    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    #[must_use]
    pub fn enrichment_enabled(&self) -> bool {
        self.enricher.is_some()
    }

    /// # Errors
    ///
    /// See [`AnalysisOrchestrator::produce_with_cancel`].
    pub async fn produce(
        &self,
        request: &VideoRequest,
    ) -> Result<Arc<IntelligenceReport>, PipelineError> {
        self.produce_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Produce the report for `request`, stopping early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NotFound`] when the video does not exist.
    /// - [`PipelineError::UpstreamUnavailable`] when the fetch still fails
    ///   after its retries.
    /// - [`PipelineError::QuotaExceeded`] when the video-data budget is spent.
    /// - [`PipelineError::Cancelled`] when `cancel` fires first.
    /// - [`PipelineError::Shared`] with the leader's failure when this call
    ///   waited on another run for the same key.
    pub async fn produce_with_cancel(
        &self,
        request: &VideoRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<IntelligenceReport>, PipelineError> {
        let span = tracing::info_span!(
            "produce",
            run_id = %Uuid::new_v4(),
            video_id = request.video_id(),
            depth = %request.requested_depth(),
        );
        self.run(request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request: &VideoRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<IntelligenceReport>, PipelineError> {
        let key = CacheKey::new(
            request.video_id(),
            self.config.pipeline_version,
            request.requested_depth(),
        );

        loop {
            if let Some(report) = self.cache.get(&key).await {
                tracing::info!(status = ?report.status, "cache hit");
                return Ok(Arc::new(report));
            }

            let waiter = match self.cache.acquire_lease(&key) {
                LeaseOutcome::Leader(lease) => return self.lead(request, lease, cancel).await,
                LeaseOutcome::Follower(waiter) => waiter,
            };

            tracing::debug!("waiting on in-flight run for the same key");
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                outcome = waiter.wait() => outcome,
            };
            match outcome {
                WaitOutcome::Ready(report) => return Ok(report),
                WaitOutcome::Failed(err) => return Err(PipelineError::Shared(err)),
                WaitOutcome::Abandoned => {
                    tracing::debug!("leader abandoned its lease, starting over");
                }
            }
        }
    }

    async fn lead(
        &self,
        request: &VideoRequest,
        lease: Lease,
        cancel: &CancellationToken,
    ) -> Result<Arc<IntelligenceReport>, PipelineError> {
        // A previous leader may have stored the report between our miss and our lease.
        if let Some(report) = self.cache.get(lease.key()).await {
            let report = Arc::new(report);
            lease.complete(Arc::clone(&report));
            return Ok(report);
        }

        let raw = match self.fetch(request, cancel).await {
            Ok(raw) => raw,
            Err(PipelineError::Cancelled) => {
                tracing::info!("cancelled during fetch");
                return Err(PipelineError::Cancelled);
            }
            Err(err) => {
                tracing::warn!(error = %err, "video fetch failed");
                lease.fail(err.to_tool_error());
                return Err(err);
            }
        };

        let signals = self.extractor.extract(&raw);
        let (insight, status) = self
            .enrich(&raw, &signals, request.requested_depth(), cancel)
            .await?;

        let report = IntelligenceReport {
            video_id: request.video_id().to_owned(),
            pipeline_version: self.config.pipeline_version,
            requested_depth: request.requested_depth(),
            title: raw.title,
            signals,
            insight,
            fetched_at: Utc::now(),
            status,
        };
        tracing::info!(status = ?report.status, "report produced");

        Ok(self.cache.put(lease, report).await)
    }

    /// Fetch under the video-data budget, charging every attempt.
    async fn fetch(
        &self,
        request: &VideoRequest,
        cancel: &CancellationToken,
    ) -> Result<RawVideoData, PipelineError> {
        let depth = request.requested_depth();
        retry_with_backoff(&self.config.fetch_retry, cancel, move || async move {
            let token = self
                .governor
                .acquire(Dependency::VideoData, depth.fetch_cost())?;
            let fetched = self.source.fetch_video_data(request.video_id(), depth).await;
            self.governor.release(token);
            fetched.map_err(PipelineError::from)
        })
        .await
        .map_err(|err| match err {
            RetryError::Cancelled => PipelineError::Cancelled,
            RetryError::Failed(err) => err,
        })
    }

    /// Returns the insight, if any, and the status it implies.
    ///
    /// Only cancellation is an error here.
    async fn enrich(
        &self,
        raw: &RawVideoData,
        signals: &SignalSet,
        depth: FetchDepth,
        cancel: &CancellationToken,
    ) -> Result<(Option<Insight>, ReportStatus), PipelineError> {
        let eligible = self.config.enrich_depths.contains(&depth);
        let Some(enricher) = self.enricher.as_ref().filter(|_| eligible) else {
            return Ok((None, ReportStatus::Complete));
        };

        let prompt = build_prompt(&raw.title, signals, &raw.raw_text());
        let token = match self
            .governor
            .acquire(Dependency::Llm, enricher.estimate_cost(&prompt))
        {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "skipping enrichment, degrading to partial");
                return Ok((None, ReportStatus::Partial));
            }
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("cancelled during enrichment");
                return Err(PipelineError::Cancelled);
            }
            outcome = tokio::time::timeout(self.config.llm_timeout, enricher.enrich(&prompt)) => outcome,
        };

        match outcome {
            Ok(Ok(enrichment)) => {
                match enrichment.tokens_used {
                    Some(actual) => self.governor.settle(token, actual),
                    None => self.governor.release(token),
                }
                Ok((Some(enrichment.insight), ReportStatus::Complete))
            }
            Ok(Err(e)) => {
                self.governor.release(token);
                tracing::warn!(error = %e, "enrichment failed, degrading to partial");
                Ok((None, ReportStatus::Partial))
            }
            Err(_) => {
                self.governor.release(token);
                tracing::warn!(
                    timeout_ms = u64::try_from(self.config.llm_timeout.as_millis()).unwrap_or(u64::MAX),
                    "enrichment timed out, degrading to partial"
                );
                Ok((None, ReportStatus::Partial))
            }
        }
    }
}
