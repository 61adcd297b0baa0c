// Language model module
// Chat-completion client for OpenAI-compatible endpoints (Groq by default)

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LlmConfig;
use crate::{AskDbError, Result};

/// A text-completion service. Implementations are blocking.
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, sampling at `temperature`
    fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Client for `POST {base_url}/chat/completions` with bearer authentication
#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: Url,
    model: String,
    /// Resolved when the client is built; a missing key fails at request time
    api_key: Option<String>,
    api_key_env: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Build a client, reading the API key from the configured environment variable
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = match config.api_key() {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("{}", e);
                None
            }
        };
        Self::build(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self> {
        Self::build(config, Some(api_key))
    }

    fn build(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let endpoint = Url::parse(&base)
            .and_then(|url| url.join("chat/completions"))
            .map_err(|e| {
                AskDbError::Config(format!("Invalid LLM base URL {}: {}", config.base_url, e))
            })?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds.max(1))),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[inline]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl LanguageModel for ChatClient {
    fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AskDbError::Translation {
                message: format!(
                    "No API key for the language model: set {} in the environment or a .env file",
                    self.api_key_env
                ),
                retryable: false,
            })?;

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let request_json =
            serde_json::to_string(&request).map_err(|e| AskDbError::Translation {
                message: format!("Failed to serialize chat request: {}", e),
                retryable: false,
            })?;

        debug!("Requesting completion from {} ({})", self.endpoint, self.model);

        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", api_key))
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| classify_error(&e))?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).map_err(|e| AskDbError::Translation {
                message: format!("Failed to parse chat response: {}", e),
                retryable: false,
            })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AskDbError::Translation {
                message: "Model returned no completion".to_string(),
                retryable: false,
            })?;

        info!("Received {} characters from {}", content.len(), self.model);
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn classify_error(error: &ureq::Error) -> AskDbError {
    let (message, retryable) = match error {
        ureq::Error::StatusCode(401 | 403) => (
            format!("Language model rejected the API key: {}", error),
            false,
        ),
        ureq::Error::StatusCode(429) => (format!("Language model rate limited: {}", error), true),
        ureq::Error::StatusCode(status) => (
            format!("Language model request failed: {}", error),
            *status >= 500,
        ),
        ureq::Error::Timeout(_) => (format!("Language model timed out: {}", error), true),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => (
            format!("Could not reach language model: {}", error),
            true,
        ),
        _ => (format!("Language model request failed: {}", error), false),
    };

    warn!("{} (retryable: {})", message, retryable);
    AskDbError::Translation { message, retryable }
}
