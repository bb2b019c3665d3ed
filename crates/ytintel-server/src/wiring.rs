//! Builds the orchestrator, the search service, and their collaborators
//! from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use ytintel_core::{AppConfig, LanguageModel, ReportStore, VideoSearch, VideoSource};
use ytintel_db::{PgReportStore, PoolConfig};
use ytintel_pipeline::{
    AnalysisOrchestrator, AnthropicClient, CacheConfig, InsightEnricher, MemoryStore,
    OrchestratorConfig, QuotaGovernor, ReportCache, SearchService,
};
use ytintel_youtube::YoutubeClient;

pub struct Services {
    pub orchestrator: AnalysisOrchestrator,
    pub search: SearchService,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    let youtube = Arc::new(YoutubeClient::new(
        &config.youtube_api_key,
        config.youtube_timeout_secs,
        config.max_comments,
    )?);
    let source: Arc<dyn VideoSource> = Arc::<YoutubeClient>::clone(&youtube);
    let search: Arc<dyn VideoSearch> = youtube;

    let enricher = match config.anthropic_api_key.as_deref() {
        Some(api_key) => {
            let model: Arc<dyn LanguageModel> = Arc::new(AnthropicClient::with_base_url(
                api_key,
                &config.llm_model,
                config.llm_max_tokens,
                config.llm_timeout_secs,
                &config.llm_base_url,
            )?);
            Some(InsightEnricher::new(model, config.llm_max_tokens))
        }
        None => {
            tracing::warn!("ANTHROPIC_API_KEY not set, reports will carry no insight");
            None
        }
    };

    let store: Arc<dyn ReportStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = ytintel_db::connect_and_migrate(url, PoolConfig::from_app_config(config))
                .await?;
            Arc::new(PgReportStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, caching reports in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = ReportCache::new(store, cache_config(config));
    let governor =
        QuotaGovernor::with_limits(config.youtube_daily_units, config.llm_tokens_per_minute);

    let orchestrator_config = OrchestratorConfig::from_app_config(config);
    let search = SearchService::new(
        search,
        governor.clone(),
        orchestrator_config.fetch_retry,
    );

    Ok(Services {
        orchestrator: AnalysisOrchestrator::new(
            source,
            enricher,
            cache,
            governor,
            orchestrator_config,
        ),
        search,
    })
}

fn cache_config(config: &AppConfig) -> CacheConfig {
    CacheConfig {
        ttl: Duration::from_secs(config.cache_ttl_secs),
        partial_ttl: Duration::from_secs(config.cache_partial_ttl_secs),
    }
}
