//! Analysis orchestration for the `YouTube` intelligence pipeline.
//!
//! [`AnalysisOrchestrator`] coordinates the video-data fetch, local signal
//! extraction, and optional LLM enrichment under shared budgets
//! ([`QuotaGovernor`]), deduplicating concurrent work per key and caching
//! finished reports ([`ReportCache`]). [`SearchService`] runs uncached topic
//! searches and market analyses under the same video-data budget.

pub mod cache;
pub mod enricher;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod quota;
pub mod retry;
pub mod search;
pub mod store;

pub use cache::{CacheConfig, Lease, LeaseOutcome, ReportCache, WaitOutcome, Waiter};
pub use enricher::{Enrichment, InsightEnricher};
pub use error::{EnrichError, PipelineError};
pub use llm::AnthropicClient;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorConfig};
pub use quota::{Budget, Dependency, QuotaExceeded, QuotaGovernor, QuotaSnapshot, QuotaToken};
pub use retry::{retry_with_backoff, Classify, RetryError, RetryPolicy, Retryability};
pub use search::{SearchService, SEARCH_COST};
pub use store::MemoryStore;
pub use tokio_util::sync::CancellationToken;
