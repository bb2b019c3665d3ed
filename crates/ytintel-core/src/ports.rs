//! Collaborator interfaces consumed by the pipeline.
//!
//! Concrete implementations live in `ytintel-youtube` (video data),
//! `ytintel-pipeline::llm` (language model), and `ytintel-db` / the
//! in-memory store (persistence).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, LlmError, StoreError};
use crate::key::CacheKey;
use crate::search::{SearchQuery, SearchResults};
use crate::types::{FetchDepth, RawVideoData};

/// Fetches raw video data from the platform.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Fetch everything `depth` covers for `video_id`.
    ///
    /// # Errors
    ///
    /// [`FetchError::NotFound`] when the video does not exist and
    /// [`FetchError::Unavailable`] for transient outages.
    async fn fetch_video_data(
        &self,
        video_id: &str,
        depth: FetchDepth,
    ) -> Result<RawVideoData, FetchError>;
}

/// Topic search against the platform.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Run `query` and return the hits with their statistics, in platform order.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`VideoSource::fetch_video_data`].
    async fn search_videos(&self, query: &SearchQuery) -> Result<SearchResults, FetchError>;
}

/// Text returned by a language model, with the provider's usage count when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: Option<u64>,
}

/// A single-shot text completion endpoint.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// # Errors
    ///
    /// [`LlmError::Timeout`] or [`LlmError::RateLimited`] for throttling and
    /// slowness, [`LlmError::Rejected`] for malformed exchanges.
    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError>;

    fn model_id(&self) -> &str;
}

/// Durable key-value storage behind the report cache.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    async fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    async fn store(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Delete every record stored more than `age` ago. Returns how many went.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    async fn purge_older_than(&self, age: Duration) -> Result<u64, StoreError>;

    /// Round-trip to the backend without touching any record.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend cannot be reached.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
