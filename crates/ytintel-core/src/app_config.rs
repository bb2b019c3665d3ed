use crate::types::FetchDepth;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub youtube_api_key: String,
    pub anthropic_api_key: Option<String>,
    pub database_url: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub enrich_depths: Vec<FetchDepth>,
    pub youtube_timeout_secs: u64,
    pub fetch_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_comments: usize,
    pub top_keywords: usize,
    pub cache_ttl_secs: u64,
    pub cache_partial_ttl_secs: u64,
    pub youtube_daily_units: u64,
    pub llm_tokens_per_minute: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// Enrichment needs both an API key and at least one eligible depth.
    #[must_use]
    pub fn enrichment_enabled(&self) -> bool {
        self.anthropic_api_key.is_some() && !self.enrich_depths.is_empty()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("youtube_api_key", &"[redacted]")
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("enrich_depths", &self.enrich_depths)
            .field("youtube_timeout_secs", &self.youtube_timeout_secs)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("max_comments", &self.max_comments)
            .field("top_keywords", &self.top_keywords)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_partial_ttl_secs", &self.cache_partial_ttl_secs)
            .field("youtube_daily_units", &self.youtube_daily_units)
            .field("llm_tokens_per_minute", &self.llm_tokens_per_minute)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
