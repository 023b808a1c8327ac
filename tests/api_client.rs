//! Tests for the request/response API client against a mock backend.

use serde_json::json;
use vaelis::api::ApiClient;
use vaelis::config::Config;
use vaelis::events::ChatMode;
use vaelis::stream::GenerationRequest;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api_base_url = base_url.to_string();
    config.api_token = Some("test-token".to_string());
    config
}

#[tokio::test]
async fn generate_returns_output_and_conversation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/generate"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "prompt": "write a haiku",
            "mode": "document",
            "use_search": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": "an old silent pond",
            "conv_id": 31,
            "status": "ok",
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(&test_config(&server.uri()));
    let request = GenerationRequest::new("write a haiku", ChatMode::Document);
    let result = api.generate(&request).await.unwrap();

    assert_eq!(result.output, "an old silent pond");
    assert_eq!(result.conv_id, Some(31));
    assert_eq!(result.raw["status"], "ok");
}

#[tokio::test]
async fn generate_without_output_field_falls_back_to_raw_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"text": "unusual shape"},
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(&test_config(&server.uri()));
    let request = GenerationRequest::new("hi", ChatMode::Chat);
    let result = api.generate(&request).await.unwrap();

    assert!(result.output.contains("unusual shape"));
    assert_eq!(result.conv_id, None);
}

#[tokio::test]
async fn generate_surfaces_non_2xx_as_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let api = ApiClient::new(&test_config(&server.uri()));
    let request = GenerationRequest::new("hi", ChatMode::Chat);
    let error = api.generate(&request).await.unwrap_err();

    assert!(error.to_string().contains("500"));
}

#[tokio::test]
async fn list_conversations_parses_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversations": [
                {"id": 1, "title": "Lifetimes", "pinned": true, "tags": "rust,learning"},
                {"id": 2, "title": null},
            ],
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(&test_config(&server.uri()));
    let conversations = api.list_conversations().await.unwrap();

    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].id, 1);
    assert!(conversations[0].pinned);
    assert_eq!(conversations[1].title, None);
    assert!(!conversations[1].pinned);
}

#[tokio::test]
async fn get_conversation_parses_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"id": 5, "title": "Borrow checker"},
            "messages": [
                {"role": "user", "content": "why does this not compile"},
                {"role": "assistant", "content": "you are moving out of a borrow"},
            ],
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(&test_config(&server.uri()));
    let detail = api.get_conversation(5).await.unwrap();

    assert_eq!(detail.conversation.id, 5);
    assert_eq!(detail.messages.len(), 2);
    assert_eq!(detail.messages[0].role, "user");
}

#[tokio::test]
async fn missing_token_is_rejected_before_sending() {
    let mut config = test_config("http://127.0.0.1:9");
    config.api_token = None;

    let api = ApiClient::new(&config);
    let request = GenerationRequest::new("hi", ChatMode::Chat);
    let error = api.generate(&request).await.unwrap_err();

    assert!(error.to_string().contains("token"));
}
