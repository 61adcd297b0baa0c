// Database module
// SQLite registry of uploaded databases plus the schema embedding index (LanceDB or in-memory)

pub mod lancedb;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

pub use self::lancedb::{EmbeddingRecord, SchemaMetadata, SearchResult, VectorStore};
pub use memory::MemoryIndex;
pub use sqlite::*;

use crate::Result;

/// Append-only store of schema embeddings, searchable per database.
///
/// Every search is scoped to a single `database_id`; records tagged with any
/// other id are never returned.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append records. An empty batch is a no-op.
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Up to `limit` records tagged `database_id`, most similar first.
    async fn search(
        &self,
        query_vector: &[f32],
        database_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of records, optionally restricted to one database.
    async fn count(&self, database_id: Option<&str>) -> Result<u64>;
}

/// Sort hits by descending similarity. Ties keep their incoming order.
pub(crate) fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
}
