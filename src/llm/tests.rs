use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ChatClient {
    let config = LlmConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        model: "test-llm".to_string(),
        ..LlmConfig::default()
    };
    ChatClient::with_api_key(&config, "secret".to_string()).expect("Failed to create client")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn complete_on(client: ChatClient, prompt: &str) -> Result<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || client.complete(&prompt, 0.1))
        .await
        .expect("task joins")
}

#[test]
fn endpoint_joins_base_url() {
    let config = LlmConfig {
        base_url: "https://api.groq.com/openai/v1/".to_string(),
        ..LlmConfig::default()
    };
    let client = ChatClient::with_api_key(&config, "k".to_string()).expect("valid url");
    assert_eq!(
        client.endpoint().as_str(),
        "https://api.groq.com/openai/v1/chat/completions"
    );
    assert_eq!(client.model_name(), "llama3-70b-8192");
}

#[test]
fn invalid_base_url_is_config_error() {
    let config = LlmConfig {
        base_url: "not a url".to_string(),
        ..LlmConfig::default()
    };
    let result = ChatClient::with_api_key(&config, "k".to_string());
    assert!(matches!(result, Err(AskDbError::Config(_))));
}

#[tokio::test]
async fn sends_prompt_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("Authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "test-llm",
            "messages": [{"role": "user", "content": "How many users?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("SELECT COUNT(*) FROM users;")))
        .expect(1)
        .mount(&server)
        .await;

    let text = complete_on(client_for(&server), "How many users?")
        .await
        .expect("completion succeeds");

    assert_eq!(text, "SELECT COUNT(*) FROM users;");
}

#[tokio::test]
async fn unauthorized_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let error = complete_on(client_for(&server), "q")
        .await
        .expect_err("should fail");

    assert!(matches!(error, AskDbError::Translation { retryable: false, .. }));
}

#[tokio::test]
async fn rate_limit_and_server_errors_are_retryable() {
    for status in [429, 503] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let error = complete_on(client_for(&server), "q")
            .await
            .expect_err("should fail");

        assert!(error.is_retryable(), "status {status} should be retryable");
    }
}

#[tokio::test]
async fn timeout_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("SELECT 1"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).with_timeout(Duration::from_millis(200));
    let error = complete_on(client, "q").await.expect_err("should time out");

    assert!(matches!(error, AskDbError::Translation { retryable: true, .. }));
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let error = complete_on(client_for(&server), "q")
        .await
        .expect_err("should fail");

    assert!(matches!(error, AskDbError::Translation { retryable: false, .. }));
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let error = complete_on(client_for(&server), "q")
        .await
        .expect_err("should fail");

    assert!(!error.is_retryable());
}

#[test]
fn missing_api_key_fails_at_request_time() {
    let config = LlmConfig {
        api_key_env: "ASKDB_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        ..LlmConfig::default()
    };

    let client = ChatClient::new(&config).expect("client builds without a key");
    assert!(!client.has_api_key());

    let error = client.complete("q", 0.1).expect_err("should fail");
    match error {
        AskDbError::Translation { message, retryable } => {
            assert!(message.contains("ASKDB_TEST_KEY_THAT_IS_NEVER_SET"));
            assert!(!retryable);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
