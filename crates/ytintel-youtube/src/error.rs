use thiserror::Error;
use ytintel_core::FetchError;

/// Errors returned by the `YouTube` client.
#[derive(Debug, Error)]
pub enum YoutubeError {
    /// Network or TLS failure from the underlying HTTP client. The request
    /// URL is stripped because it carries the API key.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("video not found: {0}")]
    NotFound(String),

    /// Daily quota or rate limit reported by the API.
    #[error("YouTube quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-2xx answer, with the first `errors[].reason` when present.
    #[error("YouTube API returned {status} ({reason}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The API kept handing out page tokens past the page cap.
    #[error("pagination limit reached for {context}: exceeded {max_pages} pages")]
    PaginationLimit { context: String, max_pages: usize },
}

impl From<reqwest::Error> for YoutubeError {
    fn from(err: reqwest::Error) -> Self {
        YoutubeError::Http(err.without_url())
    }
}

impl From<YoutubeError> for FetchError {
    fn from(err: YoutubeError) -> Self {
        match err {
            YoutubeError::Http(e) => FetchError::Unavailable(e.to_string()),
            YoutubeError::NotFound(id) => FetchError::NotFound(id),
            YoutubeError::QuotaExceeded(msg) => FetchError::QuotaExceeded(msg),
            YoutubeError::Api {
                status,
                reason,
                message,
            } => {
                let text = format!("HTTP {status} ({reason}): {message}");
                if status >= 500 || status == 429 {
                    FetchError::Unavailable(text)
                } else {
                    FetchError::InvalidRequest(text)
                }
            }
            e @ (YoutubeError::Deserialize { .. }
            | YoutubeError::Xml(_)
            | YoutubeError::PaginationLimit { .. }) => FetchError::Malformed(e.to_string()),
            YoutubeError::InvalidUrl(msg) => FetchError::InvalidRequest(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> YoutubeError {
        YoutubeError::Api {
            status,
            reason: "backendError".to_owned(),
            message: "boom".to_owned(),
        }
    }

    #[test]
    fn server_errors_map_to_unavailable() {
        assert!(matches!(FetchError::from(api(503)), FetchError::Unavailable(_)));
        assert!(matches!(FetchError::from(api(429)), FetchError::Unavailable(_)));
    }

    #[test]
    fn client_errors_map_to_invalid_request() {
        assert!(matches!(FetchError::from(api(400)), FetchError::InvalidRequest(_)));
        assert!(matches!(FetchError::from(api(403)), FetchError::InvalidRequest(_)));
    }

    #[test]
    fn quota_and_not_found_keep_their_meaning() {
        assert!(matches!(
            FetchError::from(YoutubeError::QuotaExceeded("daily".to_owned())),
            FetchError::QuotaExceeded(_)
        ));
        assert!(matches!(
            FetchError::from(YoutubeError::NotFound("abc".to_owned())),
            FetchError::NotFound(_)
        ));
    }

    #[test]
    fn deserialize_errors_are_malformed() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = YoutubeError::Deserialize {
            context: "videos".to_owned(),
            source,
        };
        assert!(matches!(FetchError::from(err), FetchError::Malformed(_)));
    }

    #[test]
    fn runaway_pagination_is_malformed() {
        let err = YoutubeError::PaginationLimit {
            context: "commentThreads(videoId=abc123)".to_owned(),
            max_pages: 20,
        };
        assert_eq!(
            err.to_string(),
            "pagination limit reached for commentThreads(videoId=abc123): exceeded 20 pages"
        );
        assert!(matches!(FetchError::from(err), FetchError::Malformed(_)));
    }
}
