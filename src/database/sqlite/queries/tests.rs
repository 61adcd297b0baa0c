use super::*;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(include_str!("../migrations/001_create_uploads.sql"))
        .execute(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

fn new_upload(id: &str) -> NewUpload {
    NewUpload {
        id: id.to_string(),
        original_filename: "sales.db".to_string(),
        path: format!("/data/uploads/{}", id),
        table_count: 3,
    }
}

#[tokio::test]
async fn upload_crud_operations() {
    let (_temp_dir, pool) = create_test_pool().await;

    let created = UploadQueries::create(&pool, new_upload("a1_sales.db"))
        .await
        .expect("Failed to create upload");

    assert_eq!(created.id, "a1_sales.db");
    assert_eq!(created.original_filename, "sales.db");
    assert_eq!(created.table_count, 3);

    let retrieved = UploadQueries::get_by_id(&pool, "a1_sales.db")
        .await
        .expect("Failed to get upload")
        .expect("Upload should exist");
    assert_eq!(retrieved, created);

    assert!(
        UploadQueries::get_by_id(&pool, "missing")
            .await
            .expect("query should succeed")
            .is_none()
    );

    assert!(
        UploadQueries::delete(&pool, "a1_sales.db")
            .await
            .expect("Failed to delete")
    );
    assert!(
        !UploadQueries::delete(&pool, "a1_sales.db")
            .await
            .expect("Failed to delete")
    );
    assert_eq!(UploadQueries::count(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn latest_is_most_recent_upload() {
    let (_temp_dir, pool) = create_test_pool().await;

    assert!(
        UploadQueries::latest(&pool)
            .await
            .expect("query should succeed")
            .is_none()
    );

    for id in ["first.db", "second.db", "third.db"] {
        UploadQueries::create(&pool, new_upload(id))
            .await
            .expect("Failed to create upload");
    }

    let latest = UploadQueries::latest(&pool)
        .await
        .expect("query should succeed")
        .expect("should have an upload");
    assert_eq!(latest.id, "third.db");

    let all = UploadQueries::list_all(&pool).await.expect("list");
    let ids: Vec<&str> = all.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["third.db", "second.db", "first.db"]);
    assert_eq!(UploadQueries::count(&pool).await.expect("count"), 3);
}

#[tokio::test]
async fn duplicate_id_rejected() {
    let (_temp_dir, pool) = create_test_pool().await;

    UploadQueries::create(&pool, new_upload("dup.db"))
        .await
        .expect("Failed to create upload");
    let result = UploadQueries::create(&pool, new_upload("dup.db")).await;

    assert!(result.is_err());
}
