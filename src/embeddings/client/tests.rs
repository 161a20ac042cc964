use super::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

fn config_for(provider: EmbeddingProviderKind, api_base: String) -> EmbeddingConfig {
    EmbeddingConfig {
        provider,
        model: "test-embed".to_string(),
        api_base,
        api_key: "sk-test".to_string(),
        dimension: 3,
        ..EmbeddingConfig::default()
    }
}

#[test]
fn endpoint_per_provider() {
    let openai = HttpEmbeddingClient::new(&config_for(
        EmbeddingProviderKind::OpenAi,
        "https://api.openai.com/v1".to_string(),
    ))
    .expect("should create client");
    assert_eq!(openai.endpoint(), "https://api.openai.com/v1/embeddings");

    let ollama = HttpEmbeddingClient::new(&config_for(
        EmbeddingProviderKind::Ollama,
        "http://localhost:11434".to_string(),
    ))
    .expect("should create client");
    assert_eq!(ollama.endpoint(), "http://localhost:11434/api/embed");
    assert_eq!(ollama.model_name(), "test-embed");
}

#[test]
fn invalid_api_base_is_a_config_error() {
    let result = HttpEmbeddingClient::new(&config_for(
        EmbeddingProviderKind::OpenAi,
        "not a url".to_string(),
    ));
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[tokio::test]
async fn openai_batch_restores_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(json!({"model": "test-embed", "input": ["x", "y"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]}
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::OpenAi, server.uri()))
            .expect("should create client");

    let vectors = client
        .embed_batch(&["x".to_string(), "y".to_string()])
        .await
        .expect("should embed");

    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn ollama_single_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "test-embed", "input": ["hello"]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"model": "test-embed", "embeddings": [[0.5, 0.5, 0.0]]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::Ollama, server.uri()))
            .expect("should create client");

    let vector = client.embed("hello").await.expect("should embed");
    assert_eq!(vector, vec![0.5, 0.5, 0.0]);
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::OpenAi, server.uri()))
            .expect("should create client");

    let vectors = client.embed_batch(&[]).await.expect("should succeed");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn provider_rejection_carries_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::OpenAi, server.uri()))
            .expect("should create client");

    let err = client.embed("hello").await.expect_err("should fail");
    match err {
        RagError::EmbeddingFailed(provider_error) => {
            assert_eq!(provider_error.provider, "openai");
            assert_eq!(provider_error.status, Some(401));
            assert_eq!(provider_error.message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0, 0.0]]})),
        )
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::Ollama, server.uri()))
            .expect("should create client");

    let err = client
        .embed_batch(&["a".to_string(), "b".to_string()])
        .await
        .expect_err("should fail");
    assert!(matches!(err, RagError::EmbeddingFailed(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"embeddings": [[1.0, 0.0, 0.0]]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client =
        HttpEmbeddingClient::new(&config_for(EmbeddingProviderKind::Ollama, server.uri()))
            .expect("should create client")
            .with_transport(HttpTransport::new(
                "ollama",
                Duration::from_millis(200),
                1,
            ));

    let err = client.embed("slow").await.expect_err("should time out");
    assert!(err.is_timeout());
}
