#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const UPLOAD_COLUMNS: &str = "id, original_filename, path, table_count, uploaded_at";

pub struct UploadQueries;

impl UploadQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_upload: NewUpload) -> Result<Upload> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO uploads (id, original_filename, path, table_count, uploaded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_upload.id)
        .bind(&new_upload.original_filename)
        .bind(&new_upload.path)
        .bind(new_upload.table_count)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create upload")?;

        debug!("Registered upload {}", new_upload.id);

        Self::get_by_id(pool, &new_upload.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created upload"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Upload>> {
        let result = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {} FROM uploads WHERE id = ?",
            UPLOAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload by id")?;

        Ok(result)
    }

    /// Most recent first
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Upload>> {
        let uploads = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {} FROM uploads ORDER BY uploaded_at DESC, rowid DESC",
            UPLOAD_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list uploads")?;

        Ok(uploads)
    }

    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<Upload>> {
        let result = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {} FROM uploads ORDER BY uploaded_at DESC, rowid DESC LIMIT 1",
            UPLOAD_COLUMNS
        ))
        .fetch_optional(pool)
        .await
        .context("Failed to get latest upload")?;

        Ok(result)
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM uploads WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete upload")?
            .rows_affected();

        Ok(rows > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads")
            .fetch_one(pool)
            .await
            .context("Failed to count uploads")?;

        Ok(count)
    }
}
