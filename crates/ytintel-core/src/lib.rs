//! Shared data model, error taxonomy, collaborator traits, and configuration
//! for the `YouTube` intelligence pipeline.

pub mod app_config;
pub mod config;
pub mod error;
pub mod key;
pub mod ports;
pub mod search;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use error::{ErrorKind, FetchError, LlmError, StoreError, ToolError};
pub use key::CacheKey;
pub use ports::{Completion, LanguageModel, ReportStore, VideoSearch, VideoSource};
pub use search::{
    ChannelPerformance, CompetitionLevel, MarketAnalysis, RankedVideo, SearchOrder, SearchQuery,
    SearchReport, SearchResults, TopVideo, VideoSummary,
};
pub use types::{
    Comment, FetchDepth, Insight, IntelligenceReport, RawVideoData, ReportStatus, SignalSet,
    VideoCategory, VideoRequest, VideoStatistics,
};
