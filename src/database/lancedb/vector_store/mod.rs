
use super::{EmbeddingRecord, SchemaMetadata};
use crate::database::{VectorIndex, sort_by_similarity};
use crate::{AskDbError, Result, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "schema_embeddings";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    /// Width of the stored vectors, `None` until the table exists. The lock
    /// also serializes writers.
    vector_dimension: Mutex<Option<usize>>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: SchemaMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the store under the configured base directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(&config.vector_database_path()).await
    }

    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            AskDbError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: Mutex::new(None),
        };

        let dimension = store.detect_existing_vector_dimension().await?;
        if let Some(dim) = dimension {
            info!("Detected existing vector dimension: {}", dim);
        }
        *store.vector_dimension.lock().await = dimension;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from an existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<Option<usize>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(AskDbError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("database_id", DataType::Utf8, false),
            Field::new("table_name", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("model", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Make sure a table with `vector_dim` wide vectors exists.
    ///
    /// An empty table with a different width is recreated; a populated one is
    /// never dropped, the batch is rejected instead.
    async fn ensure_table(&self, current: &mut Option<usize>, vector_dim: usize) -> Result<()> {
        match *current {
            Some(dim) if dim == vector_dim => return Ok(()),
            Some(dim) => {
                let existing = self.open_table().await?.count_rows(None).await.map_err(|e| {
                    AskDbError::Database(format!("Failed to count rows: {}", e))
                })?;
                if existing > 0 {
                    return Err(AskDbError::Embedding {
                        message: format!(
                            "Embedding dimension {} does not match the {} dimensions already indexed",
                            vector_dim, dim
                        ),
                        retryable: false,
                    });
                }
                info!(
                    "Vector dimension changed from {} to {} on an empty table, recreating",
                    dim, vector_dim
                );
                self.connection
                    .drop_table(&self.table_name)
                    .await
                    .map_err(|e| AskDbError::Database(format!("Failed to drop table: {}", e)))?;
            }
            None => {}
        }

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to create table: {}", e)))?;

        info!("Embeddings table created with {} dimensions", vector_dim);
        *current = Some(vector_dim);
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut database_ids = Vec::with_capacity(len);
        let mut table_names = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut models = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(AskDbError::Embedding {
                    message: format!(
                        "Inconsistent embedding dimensions in batch: {} vs {}",
                        record.vector.len(),
                        vector_dim
                    ),
                    retryable: false,
                });
            }
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            database_ids.push(record.metadata.database_id.as_str());
            table_names.push(record.metadata.table_name.as_str());
            contents.push(record.metadata.content.as_str());
            models.push(record.metadata.model.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| AskDbError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(database_ids)),
            Arc::new(StringArray::from(table_names)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(models)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| AskDbError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .ok_or_else(|| AskDbError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| AskDbError::Database(format!("Invalid {} column type", name)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let database_ids = Self::string_column(batch, "database_id")?;
        let table_names = Self::string_column(batch, "table_name")?;
        let contents = Self::string_column(batch, "content")?;
        let models = Self::string_column(batch, "model")?;
        let created_ats = Self::string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    metadata: SchemaMetadata {
                        database_id: database_ids.value(row).to_string(),
                        table_name: table_names.value(row).to_string(),
                        content: contents.value(row).to_string(),
                        model: models.value(row).to_string(),
                        created_at: created_ats.value(row).to_string(),
                    },
                    // Cosine distance, so this is the cosine similarity
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(results)
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        debug!("Storing batch of {} embeddings", records.len());

        let vector_dim = records[0].vector.len();
        let mut dimension = self.vector_dimension.lock().await;
        self.ensure_table(&mut dimension, vector_dim).await?;

        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        database_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!(
            "Searching for similar vectors in {} with limit: {}",
            database_id, limit
        );

        if limit == 0 || self.count(Some(database_id)).await? == 0 {
            return Ok(Vec::new());
        }

        let stored_dim = *self.vector_dimension.lock().await;
        if stored_dim != Some(query_vector.len()) {
            warn!(
                "Query vector has {} dimensions, index has {:?}",
                query_vector.len(),
                stored_dim
            );
            return Err(AskDbError::Embedding {
                message: format!(
                    "Query embedding has {} dimensions but the index holds {:?}",
                    query_vector.len(),
                    stored_dim
                ),
                retryable: false,
            });
        }

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| AskDbError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .only_if(database_filter(database_id))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Self::parse_search_results_stream(results).await?;
        // Never hand back another database's schema
        results.retain(|result| result.metadata.database_id == database_id);
        sort_by_similarity(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self, database_id: Option<&str>) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(database_id.map(database_filter))
            .await
            .map_err(|e| AskDbError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

/// SQL predicate selecting one database's records
fn database_filter(database_id: &str) -> String {
    format!("database_id = '{}'", database_id.replace('\'', "''"))
}
