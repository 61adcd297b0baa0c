// Pipeline module
// Upload, ask and visualize flows over explicitly constructed components


use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chart::{self, ChartImage, ChartKind, ChartRenderer, ChartSpec, SvgRenderer};
use crate::config::{Config, IndexBackend};
use crate::database::{Database, MemoryIndex, NewUpload, Upload, VectorIndex, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::execution::{self, QueryResult, Value};
use crate::llm::{ChatClient, LanguageModel};
use crate::retrieval::SchemaRetriever;
use crate::schema::{self, DEFAULT_PREVIEW_ROWS, SchemaDocument};
use crate::translate::Translator;
use crate::{AskDbError, Result};

const ALLOWED_EXTENSION: &str = "db";

/// First rows of one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub name: String,
    pub preview: QueryResult,
}

/// What an upload produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSummary {
    pub upload: Upload,
    pub tables: Vec<TablePreview>,
    /// Schema documents stored in the index
    pub indexed: usize,
}

/// Answer to a natural language question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl QueryAnswer {
    #[inline]
    pub fn to_result(&self) -> QueryResult {
        QueryResult {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }
}

/// A rendered chart plus the columns it was drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_column: String,
    pub spec: ChartSpec,
    pub image: ChartImage,
}

/// The question-answering pipeline.
///
/// Holds the embedding service, vector index, language model and upload
/// registry. Nothing is global; every part is handed in or built from a
/// [`Config`].
pub struct AskDb {
    retriever: SchemaRetriever,
    translator: Translator,
    registry: Database,
    index: Arc<dyn VectorIndex>,
    renderer: Arc<dyn ChartRenderer>,
    uploads_dir: PathBuf,
}

impl AskDb {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        registry: Database,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            retriever: SchemaRetriever::new(embedder, Arc::clone(&index)),
            translator: Translator::new(model),
            registry,
            index,
            renderer: Arc::new(SvgRenderer::default()),
            uploads_dir,
        }
    }

    /// Build every component from configuration
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(OllamaClient::new(&config.ollama)?);

        let index: Arc<dyn VectorIndex> = match config.retrieval.backend {
            IndexBackend::Lance => Arc::new(VectorStore::new(config).await?),
            IndexBackend::Memory => Arc::new(MemoryIndex::new()),
        };

        let model: Arc<dyn LanguageModel> = Arc::new(ChatClient::new(&config.llm)?);
        let registry = Database::initialize_from_config_dir(config.get_base_dir()).await?;

        Ok(Self::new(embedder, index, model, registry, config.uploads_dir())
            .with_top_k(config.retrieval.top_k)
            .with_temperature(config.llm.temperature))
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.retriever = self.retriever.with_top_k(top_k);
        self
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.translator = self.translator.with_temperature(temperature);
        self
    }

    #[inline]
    pub fn with_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[inline]
    pub fn registry(&self) -> &Database {
        &self.registry
    }

    #[inline]
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Copy a `.db` file into the uploads directory, index its schema and register it
    #[inline]
    pub async fn upload(&self, source: &Path) -> Result<UploadSummary> {
        let original_filename = validate_upload_source(source)?;
        let id = format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_filename(&original_filename)
        );

        std::fs::create_dir_all(&self.uploads_dir)?;
        let stored_path = self.uploads_dir.join(&id);
        std::fs::copy(source, &stored_path).map_err(|e| {
            AskDbError::Upload(format!("Failed to copy {}: {}", source.display(), e))
        })?;
        debug!("Copied {} to {}", source.display(), stored_path.display());

        let documents = match self.extract_and_index(&stored_path, &id).await {
            Ok(documents) => documents,
            Err(e) => {
                discard_copy(&stored_path);
                return Err(e);
            }
        };

        let upload = match self
            .registry
            .insert_upload(NewUpload {
                id: id.clone(),
                original_filename,
                path: stored_path.to_string_lossy().to_string(),
                table_count: documents.len() as i64,
            })
            .await
        {
            Ok(upload) => upload,
            Err(e) => {
                discard_copy(&stored_path);
                return Err(e.into());
            }
        };

        let tables = previews(&stored_path, documents.iter().map(|d| d.table_name.clone())).await;

        info!(
            "Uploaded {} as {} with {} tables",
            upload.original_filename,
            upload.id,
            tables.len()
        );

        Ok(UploadSummary {
            upload,
            indexed: documents.len(),
            tables,
        })
    }

    async fn extract_and_index(&self, path: &Path, id: &str) -> Result<Vec<SchemaDocument>> {
        let documents = schema::extract_schema(path).await?;
        self.retriever.index_schema(&documents, id).await?;
        Ok(documents)
    }

    /// Uploads, most recent first
    #[inline]
    pub async fn list(&self) -> Result<Vec<Upload>> {
        Ok(self.registry.list_uploads().await?)
    }

    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<Upload>> {
        Ok(self.registry.get_upload(id).await?)
    }

    /// The current database: the most recent upload
    #[inline]
    pub async fn latest(&self) -> Result<Option<Upload>> {
        Ok(self.registry.latest_upload().await?)
    }

    /// Look up `database_id`, or the latest upload when none is given
    #[inline]
    pub async fn resolve(&self, database_id: Option<&str>) -> Result<Upload> {
        let upload = match database_id {
            Some(id) => self
                .get(id)
                .await?
                .ok_or_else(|| AskDbError::Upload(format!("Unknown database: {}", id)))?,
            None => self.latest().await?.ok_or_else(|| {
                AskDbError::Upload("No database uploaded".to_string())
            })?,
        };

        if !upload.path_buf().is_file() {
            return Err(AskDbError::Upload(format!(
                "Database file not found: {}",
                upload.path
            )));
        }
        Ok(upload)
    }

    /// Tables of an uploaded database with their first rows
    #[inline]
    pub async fn tables(&self, database_id: Option<&str>) -> Result<(Upload, Vec<TablePreview>)> {
        let upload = self.resolve(database_id).await?;
        let names = schema::list_tables(&upload.path_buf()).await?;
        let tables = previews(&upload.path_buf(), names).await;
        Ok((upload, tables))
    }

    /// Schema documents indexed for `database_id`
    #[inline]
    pub async fn indexed_count(&self, database_id: Option<&str>) -> Result<u64> {
        self.index.count(database_id).await
    }

    /// Retrieve schema, translate, execute
    #[inline]
    pub async fn ask(&self, database_id: Option<&str>, question: &str) -> Result<QueryAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskDbError::InvalidRequest("No question provided".to_string()));
        }

        let upload = self.resolve(database_id).await?;

        let context = self.retriever.retrieve(question, &upload.id).await?;
        if context.is_empty() {
            warn!("No schema context found for {}", upload.id);
        }

        let sql = self.translator.translate(question, &context).await?;
        let result = execution::execute(&upload.path_buf(), &sql).await?;

        Ok(QueryAnswer {
            row_count: result.rows.len(),
            sql,
            columns: result.columns,
            rows: result.rows,
        })
    }

    /// Run SQL as written against an uploaded database
    #[inline]
    pub async fn run_sql(&self, database_id: Option<&str>, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(AskDbError::InvalidRequest("No SQL query provided".to_string()));
        }
        let upload = self.resolve(database_id).await?;
        execution::execute(&upload.path_buf(), sql).await
    }

    /// Execute `sql` and chart the result
    #[inline]
    pub async fn visualize(
        &self,
        database_id: Option<&str>,
        sql: &str,
        kind: &str,
        x_column: Option<&str>,
        y_column: Option<&str>,
    ) -> Result<Visualization> {
        let kind: ChartKind = kind.parse()?;
        let result = self.run_sql(database_id, sql).await?;
        self.chart(&result, kind, x_column, y_column)
    }

    /// Chart an existing result
    #[inline]
    pub fn chart(
        &self,
        result: &QueryResult,
        kind: ChartKind,
        x_column: Option<&str>,
        y_column: Option<&str>,
    ) -> Result<Visualization> {
        let spec = chart::shape_chart(result, x_column, y_column, kind)?;
        let image = chart::render_chart(&spec, self.renderer.as_ref())?;

        Ok(Visualization {
            kind,
            x_column: spec.x_label.clone(),
            y_column: spec.y_label.clone(),
            spec,
            image,
        })
    }
}

impl std::fmt::Debug for AskDb {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AskDb")
            .field("retriever", &self.retriever)
            .field("translator", &self.translator)
            .field("uploads_dir", &self.uploads_dir)
            .finish_non_exhaustive()
    }
}

/// Original file name of an acceptable upload
fn validate_upload_source(source: &Path) -> Result<String> {
    let extension_ok = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ALLOWED_EXTENSION));
    if !extension_ok {
        return Err(AskDbError::Upload(format!(
            "Invalid file type: {} (only .db files are accepted)",
            source.display()
        )));
    }

    if !source.is_file() {
        return Err(AskDbError::Upload(format!(
            "File not found: {}",
            source.display()
        )));
    }

    source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| AskDbError::Upload(format!("No file name in {}", source.display())))
}

/// Keep ASCII alphanumerics, `.`, `_` and `-`; whitespace becomes `_`
#[inline]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload.db".to_string()
    } else {
        trimmed.to_string()
    }
}

fn discard_copy(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

async fn previews<I>(path: &Path, tables: I) -> Vec<TablePreview>
where
    I: IntoIterator<Item = String>,
{
    let mut previews = Vec::new();
    for name in tables {
        let preview = match schema::preview_table(path, &name, DEFAULT_PREVIEW_ROWS).await {
            Ok(preview) => preview,
            Err(e) => {
                warn!("Could not preview {}: {}", name, e);
                QueryResult::default()
            }
        };
        previews.push(TablePreview { name, preview });
    }
    previews
}
