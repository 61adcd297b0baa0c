// Schema module
// Reads the SQLite catalog of an uploaded database into per-table text documents


use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

use crate::execution::{self, QueryResult};
use crate::{AskDbError, Result};

/// Rows shown per table in upload summaries
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in the DDL; empty when none was given
    pub declared_type: String,
}

/// Text description of one table, the unit that gets embedded and retrieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    /// `Table: <name>\nColumns: <col> (<type>), ...\n`
    pub content: String,
}

impl SchemaDocument {
    #[inline]
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let table_name = table_name.into();
        let content = render_document(&table_name, &columns);
        Self {
            table_name,
            columns,
            content,
        }
    }
}

fn render_document(table_name: &str, columns: &[ColumnInfo]) -> String {
    let mut content = format!("Table: {}\nColumns: ", table_name);
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            content.push_str(", ");
        }
        let _ = write!(content, "{} ({})", column.name, column.declared_type);
    }
    content.push('\n');
    content
}

/// One document per table, in catalog order, columns in declared order.
///
/// The database is opened read-only.
#[inline]
pub async fn extract_schema(path: &Path) -> Result<Vec<SchemaDocument>> {
    let mut conn = open_read_only(path).await?;

    let outcome = read_catalog(&mut conn).await;
    if let Err(e) = conn.close().await {
        debug!("Failed to close catalog connection: {}", e);
    }

    let documents = outcome?;
    info!(
        "Extracted {} schema documents from {}",
        documents.len(),
        path.display()
    );
    Ok(documents)
}

/// Table names in catalog order
#[inline]
pub async fn list_tables(path: &Path) -> Result<Vec<String>> {
    let mut conn = open_read_only(path).await?;

    let outcome = table_names(&mut conn).await;
    if let Err(e) = conn.close().await {
        debug!("Failed to close catalog connection: {}", e);
    }
    outcome
}

/// The first `limit` rows of `table`
#[inline]
pub async fn preview_table(path: &Path, table: &str, limit: usize) -> Result<QueryResult> {
    let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit);
    execution::execute(path, &sql)
        .await
        .map_err(|e| AskDbError::Extraction(format!("Failed to preview table {}: {}", table, e)))
}

/// Double-quoted SQLite identifier
#[inline]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn open_read_only(path: &Path) -> Result<SqliteConnection> {
    if !path.is_file() {
        return Err(AskDbError::Extraction(format!(
            "Database file not found: {}",
            path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);

    SqliteConnection::connect_with(&options).await.map_err(|e| {
        AskDbError::Extraction(format!("Failed to open {}: {}", path.display(), e))
    })
}

async fn table_names(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AskDbError::Extraction(format!("Failed to read catalog: {}", e)))
}

async fn read_catalog(conn: &mut SqliteConnection) -> Result<Vec<SchemaDocument>> {
    let tables = table_names(conn).await?;

    let mut documents = Vec::with_capacity(tables.len());
    for table in tables {
        let columns: Vec<(String, String)> = sqlx::query_as(
            "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(&table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AskDbError::Extraction(format!("Failed to read columns of {}: {}", table, e))
        })?;

        debug!("Table {} has {} columns", table, columns.len());

        let columns = columns
            .into_iter()
            .map(|(name, declared_type)| ColumnInfo {
                name,
                declared_type,
            })
            .collect();
        documents.push(SchemaDocument::new(table, columns));
    }

    Ok(documents)
}
