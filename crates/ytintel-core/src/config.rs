use thiserror::Error;

use crate::app_config::{AppConfig, Environment};
use crate::types::FetchDepth;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> { lookup(var).ok().filter(|v| !v.trim().is_empty()) };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let youtube_api_key = require("YOUTUBE_API_KEY")?;
    let anthropic_api_key = optional("ANTHROPIC_API_KEY");
    let database_url = optional("DATABASE_URL");

    let env = parse_environment(&or_default("YTINTEL_ENV", "development"));
    let log_level = or_default("YTINTEL_LOG_LEVEL", "info");

    let llm_base_url = or_default("YTINTEL_LLM_BASE_URL", "https://api.anthropic.com");
    let llm_model = or_default("YTINTEL_LLM_MODEL", "claude-3-sonnet-20240229");
    let llm_max_tokens = parse_u32("YTINTEL_LLM_MAX_TOKENS", "1024")?;
    let llm_timeout_secs = parse_u64("YTINTEL_LLM_TIMEOUT_SECS", "30")?;
    let enrich_depths = parse_depth_list(&or_default("YTINTEL_ENRICH_DEPTHS", "full"))
        .map_err(|reason| invalid("YTINTEL_ENRICH_DEPTHS", reason))?;

    let youtube_timeout_secs = parse_u64("YTINTEL_YOUTUBE_TIMEOUT_SECS", "15")?;
    let fetch_max_retries = parse_u32("YTINTEL_FETCH_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("YTINTEL_RETRY_BACKOFF_BASE_MS", "500")?;
    let max_comments = parse_usize("YTINTEL_MAX_COMMENTS", "100")?;
    let top_keywords = parse_usize("YTINTEL_TOP_KEYWORDS", "10")?;

    let cache_ttl_secs = parse_u64("YTINTEL_CACHE_TTL_SECS", "21600")?;
    let cache_partial_ttl_secs = parse_u64("YTINTEL_CACHE_PARTIAL_TTL_SECS", "900")?;

    let youtube_daily_units = parse_u64("YTINTEL_YOUTUBE_DAILY_UNITS", "10000")?;
    let llm_tokens_per_minute = parse_u64("YTINTEL_LLM_TOKENS_PER_MINUTE", "40000")?;

    let db_max_connections = parse_u32("YTINTEL_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("YTINTEL_DB_MIN_CONNECTIONS", "0")?;
    let db_acquire_timeout_secs = parse_u64("YTINTEL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        env,
        log_level,
        youtube_api_key,
        anthropic_api_key,
        database_url,
        llm_base_url,
        llm_model,
        llm_max_tokens,
        llm_timeout_secs,
        enrich_depths,
        youtube_timeout_secs,
        fetch_max_retries,
        retry_backoff_base_ms,
        max_comments,
        top_keywords,
        cache_ttl_secs,
        cache_partial_ttl_secs,
        youtube_daily_units,
        llm_tokens_per_minute,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

/// Parse a comma-separated depth list. An empty string or `none` disables
/// enrichment for every depth.
fn parse_depth_list(raw: &str) -> Result<Vec<FetchDepth>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }

    let mut depths = Vec::new();
    for part in trimmed.split(',') {
        let depth = part.parse::<FetchDepth>()?;
        if !depths.contains(&depth) {
            depths.push(depth);
        }
    }
    Ok(depths)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    /// Returns a map with all required env vars populated with valid defaults.
    fn full_env<'a>() -> HashMap<&'a str, &'a str> {
        let mut m = HashMap::new();
        m.insert("YOUTUBE_API_KEY", "yt-test-key");
        m
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment("development"), Environment::Development);
        assert_eq!(parse_environment("test"), Environment::Test);
        assert_eq!(parse_environment("production"), Environment::Production);
        assert_eq!(parse_environment("staging"), Environment::Development);
    }

    #[test]
    fn build_app_config_fails_without_youtube_key() {
        let map: HashMap<&str, &str> = HashMap::new();
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "YOUTUBE_API_KEY"),
            "expected MissingEnvVar(YOUTUBE_API_KEY), got: {result:?}"
        );
    }

    #[test]
    fn blank_youtube_key_counts_as_missing() {
        let mut map = HashMap::new();
        map.insert("YOUTUBE_API_KEY", "   ");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn build_app_config_applies_defaults() {
        let map = full_env();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.anthropic_api_key.is_none());
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.llm_base_url, "https://api.anthropic.com");
        assert_eq!(cfg.llm_max_tokens, 1024);
        assert_eq!(cfg.llm_timeout_secs, 30);
        assert_eq!(cfg.enrich_depths, vec![FetchDepth::Full]);
        assert_eq!(cfg.youtube_timeout_secs, 15);
        assert_eq!(cfg.fetch_max_retries, 2);
        assert_eq!(cfg.retry_backoff_base_ms, 500);
        assert_eq!(cfg.max_comments, 100);
        assert_eq!(cfg.top_keywords, 10);
        assert_eq!(cfg.cache_ttl_secs, 21_600);
        assert_eq!(cfg.cache_partial_ttl_secs, 900);
        assert_eq!(cfg.youtube_daily_units, 10_000);
        assert_eq!(cfg.llm_tokens_per_minute, 40_000);
        assert!(!cfg.enrichment_enabled());
    }

    #[test]
    fn anthropic_key_enables_enrichment() {
        let mut map = full_env();
        map.insert("ANTHROPIC_API_KEY", "sk-ant-test");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert!(cfg.enrichment_enabled());
    }

    #[test]
    fn enrich_depths_none_disables_enrichment() {
        let mut map = full_env();
        map.insert("ANTHROPIC_API_KEY", "sk-ant-test");
        map.insert("YTINTEL_ENRICH_DEPTHS", "none");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert!(cfg.enrich_depths.is_empty());
        assert!(!cfg.enrichment_enabled());
    }

    #[test]
    fn enrich_depths_parses_list_and_dedups() {
        let mut map = full_env();
        map.insert("YTINTEL_ENRICH_DEPTHS", "full, metadata_and_comments,full");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(
            cfg.enrich_depths,
            vec![FetchDepth::Full, FetchDepth::MetadataAndComments]
        );
    }

    #[test]
    fn enrich_depths_rejects_unknown_depth() {
        let mut map = full_env();
        map.insert("YTINTEL_ENRICH_DEPTHS", "full,deep");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "YTINTEL_ENRICH_DEPTHS"),
            "expected InvalidEnvVar(YTINTEL_ENRICH_DEPTHS), got: {result:?}"
        );
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        let mut map = full_env();
        map.insert("YTINTEL_CACHE_TTL_SECS", "six hours");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "YTINTEL_CACHE_TTL_SECS"),
            "expected InvalidEnvVar(YTINTEL_CACHE_TTL_SECS), got: {result:?}"
        );
    }

    #[test]
    fn overrides_are_applied() {
        let mut map = full_env();
        map.insert("YTINTEL_FETCH_MAX_RETRIES", "4");
        map.insert("YTINTEL_YOUTUBE_DAILY_UNITS", "500");
        map.insert("YTINTEL_ENV", "production");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.fetch_max_retries, 4);
        assert_eq!(cfg.youtube_daily_units, 500);
        assert_eq!(cfg.env, Environment::Production);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut map = full_env();
        map.insert("ANTHROPIC_API_KEY", "sk-ant-secret");
        map.insert("DATABASE_URL", "postgres://user:hunter2@db/ytintel");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("yt-test-key"));
        assert!(!rendered.contains("sk-ant-secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
