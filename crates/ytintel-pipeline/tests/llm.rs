//! Integration tests for `AnthropicClient` using wiremock HTTP mocks.

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ytintel_core::{LanguageModel, LlmError};
use ytintel_pipeline::AnthropicClient;

fn test_client(base_url: &str, timeout_secs: u64) -> AnthropicClient {
    AnthropicClient::with_base_url("test-key", "claude-test", 256, timeout_secs, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn complete_returns_text_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-test",
            "max_tokens": 256,
            "messages": [{ "role": "user", "content": "summarise this" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": "{\"summary\":\"ok\"," },
                { "type": "text", "text": "\"confidence\":0.5}" }
            ],
            "usage": { "input_tokens": 120, "output_tokens": 30 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 5);
    let completion = client
        .complete("summarise this")
        .await
        .expect("completion should succeed");

    assert_eq!(completion.text, "{\"summary\":\"ok\",\"confidence\":0.5}");
    assert_eq!(completion.tokens_used, Some(150));
    assert_eq!(client.model_id(), "claude-test");
}

#[tokio::test]
async fn too_many_requests_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 5)
        .complete("hi")
        .await
        .expect_err("should fail");
    assert!(matches!(err, LlmError::RateLimited(_)), "got {err:?}");
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 5)
        .complete("hi")
        .await
        .expect_err("should fail");
    assert!(matches!(err, LlmError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn bad_request_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "max_tokens too large" }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 5)
        .complete("hi")
        .await
        .expect_err("should fail");
    assert!(matches!(err, LlmError::Rejected(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [],
            "usage": { "input_tokens": 10, "output_tokens": 0 }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 5)
        .complete("hi")
        .await
        .expect_err("should fail");
    assert!(matches!(err, LlmError::Rejected(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(3))
                .set_body_json(serde_json::json!({ "content": [] })),
        )
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 1)
        .complete("hi")
        .await
        .expect_err("should time out");
    assert_eq!(err, LlmError::Timeout);
}
