use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, batch_size: u32) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-model".to_string(),
        batch_size,
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config).expect("Failed to create client")
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.model_name(), "test-model");
}

#[test]
fn empty_input_makes_no_request() {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    let vectors = client.embed(&[]).expect("empty input succeeds");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn embeds_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let texts: Vec<String> = (0..4).map(|i| format!("Table: t{i}")).collect();

    let vectors = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task joins")
        .expect("embedding succeeds");

    assert_eq!(vectors.len(), 4);
    assert_eq!(vectors[2], vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let texts = vec!["a".to_string(), "b".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task joins");

    assert!(matches!(
        result,
        Err(AskDbError::Embedding {
            retryable: false,
            ..
        })
    ));
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let texts = vec!["Table: users".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task joins");

    let error = result.expect_err("503 should fail");
    assert!(error.is_retryable());
}

#[tokio::test]
async fn client_errors_are_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let texts = vec!["Table: users".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task joins");

    assert!(!result.expect_err("404 should fail").is_retryable());
}

#[tokio::test]
async fn timeout_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"embeddings": [[0.1]]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 16).with_timeout(Duration::from_millis(200));
    let texts = vec!["Table: users".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task joins");

    let error = result.expect_err("slow server should time out");
    assert!(error.is_retryable());
}

#[tokio::test]
async fn health_check_requires_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "other-model"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 16);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task joins");

    assert!(result.is_err());
}
