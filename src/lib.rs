use thiserror::Error;

pub type Result<T> = std::result::Result<T, AskDbError>;

#[derive(Error, Debug)]
pub enum AskDbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {message}")]
    Embedding { message: String, retryable: bool },

    #[error("Translation error: {message}")]
    Translation { message: String, retryable: bool },

    #[error("SQLite error: {message}\nSQL: {sql}")]
    Execution { sql: String, message: String },

    #[error("No numeric columns found for visualization")]
    NoNumericColumn,

    #[error("Unsupported chart kind: {0} (expected one of bar, line, pie, scatter)")]
    UnsupportedChartKind(String),

    #[error("Specified column not found in results: {0}")]
    UnknownColumn(String),

    #[error("Column {0} contains non-numeric values and cannot be plotted")]
    NonNumericColumn(String),

    #[error("No data returned from query")]
    EmptyResult,

    #[error("Cannot draw chart: {0}")]
    InvalidChartData(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AskDbError {
    /// Whether repeating the same call later might succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { retryable, .. } | Self::Translation { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// The statement that failed, for execution errors.
    #[inline]
    pub fn failed_sql(&self) -> Option<&str> {
        match self {
            Self::Execution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

pub mod chart;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod execution;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod schema;
pub mod translate;
