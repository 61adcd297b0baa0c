// LanceDB vector database module
// Handles vector storage and similarity search for schema embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding of one schema document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: SchemaMetadata,
}

/// Metadata stored alongside a schema embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaMetadata {
    /// Uploaded database this schema belongs to; every search filters on it
    pub database_id: String,
    pub table_name: String,
    /// The schema document text
    pub content: String,
    /// Embedding model that produced the vector
    pub model: String,
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(vector: Vec<f32>, metadata: SchemaMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata,
        }
    }
}
