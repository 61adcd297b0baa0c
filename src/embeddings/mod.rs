// Embeddings module
// Text-embedding service seam and the Ollama implementation

pub mod ollama;

pub use ollama::{EmbeddingResult, OllamaClient};

use crate::Result;

/// A text-embedding service producing one fixed-dimension vector per input.
///
/// Implementations are blocking; callers on an async runtime go through
/// [`embed_blocking`].
pub trait Embedder: Send + Sync {
    /// Embed every text, in order. An empty input yields an empty output.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name, recorded next to stored vectors
    fn model_name(&self) -> &str;
}

/// Run an [`Embedder`] on the blocking thread pool.
#[inline]
pub async fn embed_blocking(
    embedder: std::sync::Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || embedder.embed(&texts))
        .await
        .map_err(|e| crate::AskDbError::Embedding {
            message: format!("Embedding task failed: {}", e),
            retryable: false,
        })?
}
