use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{NewUpload, Upload};
use crate::database::sqlite::queries::UploadQueries;


pub mod models;
pub mod queries;

pub use models::*;
pub use queries::*;

pub type DbPool = Pool<Sqlite>;

/// Metadata store: the registry of uploaded databases
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    // Upload operations
    #[inline]
    pub async fn insert_upload(&self, upload: NewUpload) -> Result<Upload> {
        UploadQueries::create(&self.pool, upload).await
    }

    #[inline]
    pub async fn get_upload(&self, id: &str) -> Result<Option<Upload>> {
        UploadQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn list_uploads(&self) -> Result<Vec<Upload>> {
        UploadQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn latest_upload(&self) -> Result<Option<Upload>> {
        UploadQueries::latest(&self.pool).await
    }

    #[inline]
    pub async fn delete_upload(&self, id: &str) -> Result<bool> {
        UploadQueries::delete(&self.pool, id).await
    }

    #[inline]
    pub async fn upload_count(&self) -> Result<i64> {
        UploadQueries::count(&self.pool).await
    }
}
