use super::*;
use crate::database::SchemaMetadata;

fn record(vector: Vec<f32>, database_id: &str, table: &str) -> EmbeddingRecord {
    EmbeddingRecord::new(
        vector,
        SchemaMetadata {
            database_id: database_id.to_string(),
            table_name: table.to_string(),
            content: format!("Table: {}\nColumns: id (INTEGER)\n", table),
            model: "test-model".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    )
}

#[test]
fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}

#[tokio::test]
async fn empty_index_returns_nothing() {
    let index = MemoryIndex::new();

    let results = index
        .search(&[1.0, 0.0, 0.0], "db_a", 3)
        .await
        .expect("search should succeed");

    assert!(results.is_empty());
    assert_eq!(index.count(None).await.expect("count"), 0);
}

#[tokio::test]
async fn search_never_crosses_databases() {
    let index = MemoryIndex::new();
    index
        .add(vec![
            record(vec![1.0, 0.0, 0.0], "db_a", "users"),
            record(vec![1.0, 0.0, 0.0], "db_b", "payroll"),
            record(vec![0.0, 1.0, 0.0], "db_b", "audit"),
        ])
        .await
        .expect("add should succeed");

    let results = index
        .search(&[1.0, 0.0, 0.0], "db_a", 10)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.table_name, "users");
    assert_eq!(index.count(Some("db_b")).await.expect("count"), 2);
    assert_eq!(index.count(None).await.expect("count"), 3);
}

#[tokio::test]
async fn results_are_ranked_and_truncated() {
    let index = MemoryIndex::new();
    index
        .add(vec![
            record(vec![0.0, 1.0, 0.0], "db_a", "far"),
            record(vec![0.7, 0.7, 0.0], "db_a", "near"),
            record(vec![1.0, 0.0, 0.0], "db_a", "exact"),
        ])
        .await
        .expect("add should succeed");

    let results = index
        .search(&[1.0, 0.0, 0.0], "db_a", 2)
        .await
        .expect("search should succeed");

    let tables: Vec<&str> = results
        .iter()
        .map(|r| r.metadata.table_name.as_str())
        .collect();
    assert_eq!(tables, vec!["exact", "near"]);
    assert!(results[0].similarity_score >= results[1].similarity_score);
    assert!(results[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn dimension_mismatch_rejected() {
    let index = MemoryIndex::new();
    index
        .add(vec![record(vec![1.0, 0.0, 0.0], "db_a", "users")])
        .await
        .expect("add should succeed");

    let result = index
        .add(vec![record(vec![1.0, 0.0], "db_a", "orders")])
        .await;

    assert!(matches!(
        result,
        Err(AskDbError::Embedding {
            retryable: false,
            ..
        })
    ));
    assert_eq!(index.count(None).await.expect("count"), 1);
}

#[tokio::test]
async fn mixed_width_batch_is_rejected_whole() {
    let index = MemoryIndex::new();

    let result = index
        .add(vec![
            record(vec![1.0, 0.0, 0.0], "db_a", "users"),
            record(vec![1.0, 0.0], "db_a", "orders"),
        ])
        .await;

    assert!(matches!(
        result,
        Err(AskDbError::Embedding {
            retryable: false,
            ..
        })
    ));
    assert_eq!(index.count(None).await.expect("count"), 0);
}

#[tokio::test]
async fn query_width_must_match_index() {
    let index = MemoryIndex::new();
    index
        .add(vec![
            record(vec![1.0, 0.0, 0.0], "db_a", "users"),
            record(vec![0.0, 1.0, 0.0], "db_a", "orders"),
        ])
        .await
        .expect("add should succeed");

    let result = index.search(&[1.0, 0.0], "db_a", 3).await;
    assert!(matches!(
        result,
        Err(AskDbError::Embedding {
            retryable: false,
            ..
        })
    ));

    // A database with nothing indexed has nothing to compare against
    let empty = index
        .search(&[1.0, 0.0], "db_b", 3)
        .await
        .expect("search should succeed");
    assert!(empty.is_empty());
}
