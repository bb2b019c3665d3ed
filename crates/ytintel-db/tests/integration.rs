//! Offline unit tests for ytintel-db pool configuration and row types.
//! These tests do not require a live database connection.

use ytintel_core::{AppConfig, Environment, FetchDepth};
use ytintel_db::{PoolConfig, ReportCacheRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        env: Environment::Test,
        log_level: "info".to_string(),
        youtube_api_key: "yt-key".to_string(),
        anthropic_api_key: None,
        database_url: Some("postgres://example".to_string()),
        llm_base_url: "https://api.anthropic.com".to_string(),
        llm_model: "claude-3-sonnet-20240229".to_string(),
        llm_max_tokens: 1024,
        llm_timeout_secs: 30,
        enrich_depths: vec![FetchDepth::Full],
        youtube_timeout_secs: 15,
        fetch_max_retries: 2,
        retry_backoff_base_ms: 500,
        max_comments: 100,
        top_keywords: 10,
        cache_ttl_secs: 21_600,
        cache_partial_ttl_secs: 900,
        youtube_daily_units: 10_000,
        llm_tokens_per_minute: 40_000,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`ReportCacheRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn report_cache_row_has_expected_fields() {
    let row = ReportCacheRow {
        cache_key: "ab".repeat(32),
        video_id: "abc123".to_string(),
        pipeline_version: 1_i32,
        requested_depth: "full".to_string(),
        payload: b"{}".to_vec(),
        stored_at: chrono::Utc::now(),
    };

    assert_eq!(row.cache_key.len(), 64);
    assert_eq!(row.pipeline_version, 1);
    assert_eq!(row.payload, b"{}");
}
