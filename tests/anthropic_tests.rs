//! Anthropic client against a mock HTTP server.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{local_transport, sum_tool, test_config};
use toolloop::agent::Session;
use toolloop::config::AgentConfig;
use toolloop::error::AgentError;
use toolloop::model::{AnthropicClient, GenerationSettings, ModelClient, ModelRequest, ModelResponse};
use toolloop::types::{Message, ToolCallRequest, ToolResult};

fn client(server: &MockServer) -> AnthropicClient {
    AnthropicClient::new("sk-test", Some(format!("{}/v1/", server.uri())))
}

fn request(messages: Vec<Message>) -> ModelRequest {
    ModelRequest {
        messages,
        tools: vec![],
        settings: GenerationSettings::default(),
    }
}

#[tokio::test]
async fn sends_headers_and_parses_text_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 4000,
            "messages": [{ "role": "user", "content": [{ "type": "text", "text": "Hi" }] }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Hello!" }],
            "stop_reason": "end_turn",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send(&request(vec![Message::user("Hi")]))
        .await
        .unwrap();

    assert_eq!(response, ModelResponse::FinalAnswer("Hello!".into()));
}

#[tokio::test]
async fn tool_use_blocks_become_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Let me add." },
                { "type": "tool_use", "id": "toolu_1", "name": "sum", "input": { "a": 2, "b": 3 } },
            ],
            "stop_reason": "tool_use",
        })))
        .mount(&server)
        .await;

    let response = client(&server)
        .send(&request(vec![Message::user("2 + 3?")]))
        .await
        .unwrap();

    assert_eq!(
        response,
        ModelResponse::ToolCallsRequested {
            text: "Let me add.".into(),
            calls: vec![ToolCallRequest::new("toolu_1", "sum", json!({ "a": 2, "b": 3 }))],
        }
    );
}

#[tokio::test]
async fn tool_results_are_sent_as_user_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "user" },
                { "role": "assistant" },
                {
                    "role": "user",
                    "content": [
                        { "type": "tool_result", "tool_use_id": "c1", "content": "5" },
                    ],
                },
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "5" }],
            "stop_reason": "end_turn",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let messages = vec![
        Message::user("2 + 3?"),
        Message::assistant_tool_calls("", vec![ToolCallRequest::new("c1", "sum", json!({ "a": 2, "b": 3 }))]),
        Message::tool_result("c1", ToolResult::success(json!(5))),
    ];

    let response = client(&server).send(&request(messages)).await.unwrap();

    assert_eq!(response, ModelResponse::FinalAnswer("5".into()));
}

#[tokio::test]
async fn overloaded_status_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" },
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&request(vec![Message::user("Hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ModelUnavailable(ref m) if m.contains("Overloaded")));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn bad_request_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "max_tokens too large" },
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&request(vec![Message::user("Hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ModelProtocol(ref m) if m.contains("max_tokens too large")));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_content_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [],
            "stop_reason": "max_tokens",
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&request(vec![Message::user("Hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ModelProtocol(ref m) if m.contains("max_tokens")));
}

#[test]
fn from_config_requires_api_key() {
    let err = AnthropicClient::from_config(&AgentConfig::default()).err().unwrap();

    assert!(matches!(err, AgentError::InvalidConfig(_)));
}

#[tokio::test]
async fn session_retries_transient_http_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "back online" }],
            "stop_reason": "end_turn",
        })))
        .mount(&server)
        .await;
    let config = AgentConfig {
        api_key: Some("sk-test".into()),
        base_url: Some(format!("{}/v1", server.uri())),
        ..test_config()
    };
    let model = Arc::new(AnthropicClient::from_config(&config).unwrap());
    let mut session = Session::start(config, local_transport(vec![sum_tool()]), model)
        .await
        .unwrap();

    let answer = session.submit("ping").await.unwrap();

    assert_eq!(answer.text, "back online");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
