
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

/// A database file that has been uploaded, copied and indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Upload {
    /// `<uuid-hex>_<sanitized filename>`; doubles as the index `database_id`
    pub id: String,
    pub original_filename: String,
    /// Location of the stored copy
    pub path: String,
    pub table_count: i64,
    pub uploaded_at: NaiveDateTime,
}

impl Upload {
    #[inline]
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    #[inline]
    pub fn has_tables(&self) -> bool {
        self.table_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUpload {
    pub id: String,
    pub original_filename: String,
    pub path: String,
    pub table_count: i64,
}
