use doccrawl_client::{ChatClient, OpenAiExtractor, OpenAiTransformer};
use doccrawl_core::error::AppError;
use doccrawl_core::traits::{Extractor, TextTransform};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{chat_reply, credentials};

async fn transformer(server: &MockServer) -> OpenAiTransformer {
    OpenAiTransformer::new(ChatClient::new(&credentials(server), "test-model").unwrap())
}

#[tokio::test]
async fn transform_posts_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "temperature": 0.5,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("# 安装\n\n步骤")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = transformer(&server)
        .await
        .transform("Rewrite as Markdown.", "<h1>Install</h1>")
        .await
        .unwrap();
    assert_eq!(reply, "# 安装\n\n步骤");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.starts_with("Rewrite as Markdown."));
    assert!(user.ends_with("<h1>Install</h1>"));
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(serde_json::json!({"error": {"message": "model overloaded"}})),
        )
        .mount(&server)
        .await;

    let err = transformer(&server)
        .await
        .transform("x", "y")
        .await
        .unwrap_err();
    match err {
        AppError::LlmError {
            message,
            status_code,
        } => {
            assert_eq!(status_code, 503);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limited_reply_maps_to_rate_limit_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = transformer(&server).await.transform("x", "y").await.unwrap_err();
    assert!(matches!(err, AppError::RateLimitExceeded));
}

#[tokio::test]
async fn blank_reply_is_a_transform_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("   ")))
        .mount(&server)
        .await;

    let err = transformer(&server).await.transform("x", "y").await.unwrap_err();
    assert!(matches!(err, AppError::TransformError(_)));
}

#[tokio::test]
async fn extractor_requests_json_schema_and_parses_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "endpoint", "strict": true}}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_reply(r#"{"path": "/users"}"#)),
        )
        .mount(&server)
        .await;

    let extractor = OpenAiExtractor::new(
        ChatClient::new(&credentials(&server), "test-model").unwrap(),
        "endpoint",
    );
    let value = extractor
        .extract("GET /users", &serde_json::json!({"type": "object"}))
        .await
        .unwrap();
    assert_eq!(value, serde_json::json!({"path": "/users"}));
}

#[tokio::test]
async fn extractor_rejects_non_json_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("not json")))
        .mount(&server)
        .await;

    let extractor = OpenAiExtractor::new(
        ChatClient::new(&credentials(&server), "test-model").unwrap(),
        "endpoint",
    );
    let err = extractor
        .extract("x", &serde_json::json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SchemaValidationError(_)));
}

#[tokio::test]
async fn transformer_overrides_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    transformer(&server)
        .await
        .with_temperature(0.0)
        .with_system_prompt("Translate only.")
        .transform("x", "y")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["messages"][0]["content"], "Translate only.");
}
