#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::sync::RwLock;
use tracing::debug;

use super::lancedb::{EmbeddingRecord, SearchResult};
use super::{VectorIndex, sort_by_similarity};
use crate::{AskDbError, Result};

/// In-process brute-force index. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut stored = self
            .records
            .write()
            .map_err(|_| AskDbError::Database("Memory index lock poisoned".to_string()))?;

        let expected = stored
            .first()
            .or_else(|| records.first())
            .map_or(0, |record| record.vector.len());
        if let Some(mismatch) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(AskDbError::Embedding {
                message: format!(
                    "Embedding dimension {} does not match the {} dimensions already indexed",
                    mismatch.vector.len(),
                    expected
                ),
                retryable: false,
            });
        }

        debug!("Adding {} records to memory index", records.len());
        stored.extend(records);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        database_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let stored = self
            .records
            .read()
            .map_err(|_| AskDbError::Database("Memory index lock poisoned".to_string()))?;

        let candidates: Vec<&EmbeddingRecord> = stored
            .iter()
            .filter(|record| record.metadata.database_id == database_id)
            .collect();
        if limit == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let stored_dim = stored.first().map(|record| record.vector.len());
        if stored_dim != Some(query_vector.len()) {
            return Err(AskDbError::Embedding {
                message: format!(
                    "Query embedding has {} dimensions but the index holds {:?}",
                    query_vector.len(),
                    stored_dim
                ),
                retryable: false,
            });
        }

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|record| {
                let similarity_score = cosine_similarity(query_vector, &record.vector);
                SearchResult {
                    metadata: record.metadata.clone(),
                    similarity_score,
                    distance: 1.0 - similarity_score,
                }
            })
            .collect();

        sort_by_similarity(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self, database_id: Option<&str>) -> Result<u64> {
        let stored = self
            .records
            .read()
            .map_err(|_| AskDbError::Database("Memory index lock poisoned".to_string()))?;

        let count = match database_id {
            Some(id) => stored
                .iter()
                .filter(|record| record.metadata.database_id == id)
                .count(),
            None => stored.len(),
        };
        Ok(count as u64)
    }
}

/// Cosine similarity; 0.0 when either vector has no magnitude or the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
