//! OpenAI-compatible backend against a wiremock server.

#![cfg(feature = "openai")]

use mnema_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend};
use mnema_inference::openai::{OpenAIBackend, OpenAIConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OpenAIConfig {
    OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        embed_model: "test-embed".to_string(),
        gen_model: "test-gen".to_string(),
        embed_dimension: 2,
        timeout_seconds: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_embeddings_sorted_by_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "embedding": [0.0, 1.0], "index": 1 },
                { "embedding": [1.0, 0.0], "index": 0 }
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let vectors = backend
        .embed_texts(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors[0].as_slice(), &[1.0, 0.0]);
    assert_eq!(vectors[1].as_slice(), &[0.0, 1.0]);
}

#[tokio::test]
async fn test_json_generation_sets_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-gen",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "{\"tags\": [\"rust\"]}" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let out = backend
        .generate_json_with_system("json only", "tag this")
        .await
        .unwrap();
    assert_eq!(out, "{\"tags\": [\"rust\"]}");
}

#[tokio::test]
async fn test_json_mode_disabled_omits_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "{}" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(OpenAIConfig {
        json_mode: false,
        ..config_for(&server)
    })
    .unwrap();
    backend.generate_json("anything").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn test_auth_failure_maps_to_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let err = backend.generate("hello").await.unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{:?}", err);
}

#[tokio::test]
async fn test_embedding_server_error_maps_to_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    let err = backend.embed_texts(&["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)), "{:?}", err);
}

#[tokio::test]
async fn test_empty_choices_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    assert!(matches!(
        backend.generate("hello").await,
        Err(Error::Inference(_))
    ));
}

#[tokio::test]
async fn test_health_check_uses_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config_for(&server)).unwrap();
    assert!(backend.health_check().await.unwrap());
}
