// Retrieval module
// Indexes schema documents per database and fetches the most relevant ones for a question


use chrono::Utc;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{EmbeddingRecord, SchemaMetadata, SearchResult, VectorIndex};
use crate::embeddings::{Embedder, embed_blocking};
use crate::schema::SchemaDocument;
use crate::{AskDbError, Result};

pub const DEFAULT_TOP_K: usize = 3;
const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct SchemaRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl SchemaRetriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed and store `documents` under `database_id`. Returns how many were stored.
    #[inline]
    pub async fn index_schema(
        &self,
        documents: &[SchemaDocument],
        database_id: &str,
    ) -> Result<usize> {
        if documents.is_empty() {
            debug!("No schema documents to index for {}", database_id);
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = embed_blocking(Arc::clone(&self.embedder), texts).await?;

        if vectors.len() != documents.len() {
            return Err(AskDbError::Embedding {
                message: format!(
                    "Expected {} embeddings, got {}",
                    documents.len(),
                    vectors.len()
                ),
                retryable: false,
            });
        }

        let created_at = Utc::now().to_rfc3339();
        let model = self.embedder.model_name().to_string();
        let records: Vec<EmbeddingRecord> = documents
            .iter()
            .zip(vectors)
            .map(|(document, vector)| {
                EmbeddingRecord::new(
                    vector,
                    SchemaMetadata {
                        database_id: database_id.to_string(),
                        table_name: document.table_name.clone(),
                        content: document.content.clone(),
                        model: model.clone(),
                        created_at: created_at.clone(),
                    },
                )
            })
            .collect();

        let stored = records.len();
        self.index.add(records).await?;

        info!("Indexed {} schema documents for {}", stored, database_id);
        Ok(stored)
    }

    /// The top-K matches for `question` within `database_id`, most similar first
    #[inline]
    pub async fn search(&self, question: &str, database_id: &str) -> Result<Vec<SearchResult>> {
        if self.top_k == 0 || self.index.count(Some(database_id)).await? == 0 {
            debug!("Nothing indexed for {}", database_id);
            return Ok(Vec::new());
        }

        let mut vectors =
            embed_blocking(Arc::clone(&self.embedder), vec![question.to_string()]).await?;
        let query_vector = vectors.pop().ok_or_else(|| AskDbError::Embedding {
            message: "Embedding service returned no vector for the question".to_string(),
            retryable: false,
        })?;

        let results = self
            .index
            .search(&query_vector, database_id, self.top_k)
            .await?;

        debug!(
            "Retrieved {} schema documents for {}",
            results.len(),
            database_id
        );
        Ok(results)
    }

    /// Retrieved documents joined by blank lines; empty when nothing is indexed
    #[inline]
    pub async fn retrieve(&self, question: &str, database_id: &str) -> Result<String> {
        let results = self.search(question, database_id).await?;
        Ok(join_context(&results))
    }
}

impl std::fmt::Debug for SchemaRetriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRetriever")
            .field("embedder", &self.embedder.model_name())
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

fn join_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| result.metadata.content.as_str())
        .join(CONTEXT_SEPARATOR)
}
