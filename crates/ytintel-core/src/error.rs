use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories surfaced to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UpstreamUnavailable,
    QuotaExceeded,
    InvalidRequest,
    Cancelled,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamUnavailable | ErrorKind::QuotaExceeded | ErrorKind::Cancelled
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The small, typed error returned across the tool boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
}

/// Errors from the video-data collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("video not found: {0}")]
    NotFound(String),

    /// Transient platform outage: timeouts, connection failures, 5xx.
    #[error("video platform unavailable: {0}")]
    Unavailable(String),

    #[error("video platform quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid video request: {0}")]
    InvalidRequest(String),

    /// The platform answered with a body that does not match its contract.
    #[error("malformed video platform response: {0}")]
    Malformed(String),
}

impl FetchError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Unavailable(_))
    }
}

/// Errors from the language-model collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("language model timed out")]
    Timeout,

    #[error("language model rate limited: {0}")]
    RateLimited(String),

    #[error("language model unavailable: {0}")]
    Unavailable(String),

    #[error("language model rejected the request: {0}")]
    Rejected(String),
}

/// Errors from the persistence backend behind the report cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("report store unavailable: {0}")]
pub struct StoreError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_serializes_kind_snake_case() {
        let err = ToolError::new(ErrorKind::UpstreamUnavailable, "youtube down");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "upstream_unavailable");
        assert_eq!(json["message"], "youtube down");
    }

    #[test]
    fn tool_error_display_includes_kind() {
        let err = ToolError::new(ErrorKind::NotFound, "no such video");
        assert_eq!(err.to_string(), "not_found: no such video");
    }

    #[test]
    fn only_unavailable_fetch_errors_are_transient() {
        assert!(FetchError::Unavailable("503".into()).is_transient());
        assert!(!FetchError::NotFound("x".into()).is_transient());
        assert!(!FetchError::QuotaExceeded("daily".into()).is_transient());
        assert!(!FetchError::InvalidRequest("bad id".into()).is_transient());
        assert!(!FetchError::Malformed("missing items".into()).is_transient());
    }
}
