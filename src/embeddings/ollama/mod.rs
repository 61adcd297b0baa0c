#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::Embedder;
use crate::config::OllamaConfig;
use crate::{AskDbError, Result};

/// Output width of `all-minilm`, the default schema embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| AskDbError::Config(format!("Failed to generate Ollama URL: {}", e)))?;

        let timeout = if config.timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            config.timeout_seconds
        };

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent: build_agent(Duration::from_secs(timeout)),
        })
    }

    /// Replace the request timeout. Every call, including batches, is bounded by it.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(AskDbError::Embedding {
                message: format!(
                    "Model '{}' is not available. Available models: {:?}",
                    self.model, available_models
                ),
                retryable: false,
            })
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| classify_error(&e, "Failed to fetch models"))?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).map_err(|e| AskDbError::Embedding {
                message: format!("Failed to parse models response: {}", e),
                retryable: false,
            })?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate embeddings for a single text input
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        let mut results = self.generate_embeddings_batch(&[text.to_string()])?;
        results.pop().ok_or_else(|| AskDbError::Embedding {
            message: "Ollama returned no embedding".to_string(),
            retryable: false,
        })
    }

    /// Generate embeddings for multiple text inputs, `batch_size` texts per request
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.generate_embeddings_single_batch(chunk)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn generate_embeddings_single_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let url = self.endpoint("/api/embed")?;

        let request_json = serde_json::to_string(&request).map_err(|e| AskDbError::Embedding {
            message: format!("Failed to serialize embedding request: {}", e),
            retryable: false,
        })?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| classify_error(&e, "Failed to generate embeddings"))?;

        let batch_response: BatchEmbedResponse =
            serde_json::from_str(&response_text).map_err(|e| AskDbError::Embedding {
                message: format!("Failed to parse embedding response: {}", e),
                retryable: false,
            })?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(AskDbError::Embedding {
                message: format!(
                    "Mismatch between request and response counts: {} vs {}",
                    texts.len(),
                    batch_response.embeddings.len()
                ),
                retryable: false,
            });
        }

        Ok(texts
            .iter()
            .zip(batch_response.embeddings)
            .map(|(text, embedding)| EmbeddingResult {
                text: text.clone(),
                embedding,
            })
            .collect())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            AskDbError::Config(format!("Failed to build Ollama URL for {}: {}", path, e))
        })
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self
            .generate_embeddings_batch(texts)?
            .into_iter()
            .map(|result| result.embedding)
            .collect())
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

/// Map a transport failure to an embedding error. Timeouts, connection
/// failures, rate limiting and server errors are worth retrying later.
fn classify_error(error: &ureq::Error, context: &str) -> AskDbError {
    let retryable = match error {
        ureq::Error::StatusCode(status) => *status == 429 || *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    };

    warn!("{}: {} (retryable: {})", context, error, retryable);

    AskDbError::Embedding {
        message: format!("{}: {}", context, error),
        retryable,
    }
}
