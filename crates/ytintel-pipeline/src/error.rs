use thiserror::Error;
use ytintel_core::{ErrorKind, FetchError, LlmError, ToolError};

use crate::quota::QuotaExceeded;

/// Failures that end an orchestration run.
///
/// Every variant maps onto a [`ToolError`] through [`PipelineError::kind`];
/// enrichment and cache-backend failures never reach this type because the
/// orchestrator degrades around them.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The platform answered with something we could not read. Surfaced as
    /// unavailable but never retried.
    #[error("upstream unavailable: {0}")]
    Malformed(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request cancelled")]
    Cancelled,

    /// Failure published by the run that held the lease for this key.
    #[error("{0}")]
    Shared(ToolError),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::UpstreamUnavailable(_) | PipelineError::Malformed(_) => {
                ErrorKind::UpstreamUnavailable
            }
            PipelineError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Shared(err) => err.kind,
        }
    }

    #[must_use]
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            PipelineError::Shared(err) => err.clone(),
            other => ToolError::new(other.kind(), other.to_string()),
        }
    }
}

impl From<PipelineError> for ToolError {
    fn from(err: PipelineError) -> Self {
        err.to_tool_error()
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(id) => PipelineError::NotFound(id),
            FetchError::QuotaExceeded(msg) => PipelineError::QuotaExceeded(msg),
            FetchError::InvalidRequest(msg) => PipelineError::InvalidRequest(msg),
            e @ FetchError::Unavailable(_) => PipelineError::UpstreamUnavailable(e.to_string()),
            e @ FetchError::Malformed(_) => PipelineError::Malformed(e.to_string()),
        }
    }
}

impl From<QuotaExceeded> for PipelineError {
    fn from(err: QuotaExceeded) -> Self {
        PipelineError::QuotaExceeded(err.to_string())
    }
}

/// Enrichment failures. Logged by the orchestrator, never surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichError {
    #[error("enrichment timed out")]
    Timeout,

    #[error("enrichment rejected: {0}")]
    Rejected(String),

    #[error("language model unavailable: {0}")]
    Unavailable(String),
}

impl From<LlmError> for EnrichError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => EnrichError::Timeout,
            LlmError::Rejected(msg) => EnrichError::Rejected(msg),
            e @ (LlmError::RateLimited(_) | LlmError::Unavailable(_)) => {
                EnrichError::Unavailable(e.to_string())
            }
        }
    }
}
