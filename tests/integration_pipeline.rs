#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end flows: upload, ask, chart and export against mocked HTTP services
use askdb::{
    AskDbError,
    chart::ChartKind,
    config::{LlmConfig, OllamaConfig},
    database::{Database, VectorIndex, VectorStore},
    embeddings::OllamaClient,
    execution::Value,
    export,
    llm::ChatClient,
    pipeline::AskDb,
};
use serde_json::json;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MONTHLY_SALES: &str = "CREATE TABLE monthly_sales (month TEXT, units INTEGER, region TEXT);
     INSERT INTO monthly_sales VALUES ('jan', 10, 'north'), ('feb', 25, 'north'), ('mar', 40, NULL);";

struct Services {
    ollama: MockServer,
    llm: MockServer,
}

async fn start_services(sql_reply: &str) -> Services {
    let ollama = MockServer::start().await;
    // A single-table database means every embed call carries exactly one text
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.3, 0.1, 0.6]]})),
        )
        .mount(&ollama)
        .await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Table: monthly_sales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": sql_reply}}]
        })))
        .mount(&llm)
        .await;

    Services { ollama, llm }
}

async fn build_askdb(services: &Services, base: &Path) -> AskDb {
    let address = services.ollama.address();
    let embedder = OllamaClient::new(&OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "all-minilm:latest".to_string(),
        ..OllamaConfig::default()
    })
    .expect("should build embedder");

    let model = ChatClient::with_api_key(
        &LlmConfig {
            base_url: format!("{}/v1", services.llm.uri()),
            ..LlmConfig::default()
        },
        "test-key".to_string(),
    )
    .expect("should build chat client");

    let index: Arc<dyn VectorIndex> = Arc::new(
        VectorStore::open(&base.join("vectors"))
            .await
            .expect("should open vector store"),
    );
    let registry = Database::initialize_from_config_dir(base)
        .await
        .expect("should open registry");

    AskDb::new(
        Arc::new(embedder),
        index,
        Arc::new(model),
        registry,
        base.join("uploads"),
    )
}

async fn create_database(dir: &Path) -> PathBuf {
    let path = dir.join("monthly sales.db");
    let mut conn = SqliteConnection::connect_with(
        &SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true),
    )
    .await
    .expect("should create database");
    sqlx::raw_sql(MONTHLY_SALES)
        .execute(&mut conn)
        .await
        .expect("should seed database");
    conn.close().await.expect("should close");
    path
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_ask_chart_and_export() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let services =
        start_services("```sql\nSELECT month, units FROM monthly_sales ORDER BY rowid\n```").await;
    let askdb = build_askdb(&services, &temp_dir.path().join("askdb")).await;
    let source = create_database(temp_dir.path()).await;

    let summary = askdb.upload(&source).await.expect("upload should succeed");
    assert_eq!(summary.indexed, 1);
    assert!(summary.upload.id.ends_with("_monthly_sales.db"));
    assert_eq!(summary.tables[0].preview.row_count(), 3);

    let answer = askdb
        .ask(None, "How many units were sold each month?")
        .await
        .expect("ask should succeed");
    assert_eq!(answer.sql, "SELECT month, units FROM monthly_sales ORDER BY rowid");
    assert_eq!(answer.row_count, 3);
    assert_eq!(
        answer.rows[2],
        vec![Value::Text("mar".to_string()), Value::Integer(40)]
    );

    let chart = askdb
        .chart(&answer.to_result(), ChartKind::Line, None, None)
        .expect("chart should render");
    assert_eq!(chart.x_column, "month");
    assert_eq!(chart.y_column, "units");
    assert_eq!(chart.spec.labels, vec!["jan", "feb", "mar"]);
    assert_eq!(chart.spec.values, vec![10.0, 25.0, 40.0]);

    let chart_path = temp_dir.path().join("units.svg");
    chart.image.write_to(&chart_path).expect("should write chart");
    let svg = std::fs::read_to_string(&chart_path).expect("should read chart");
    assert!(svg.starts_with("<svg"));

    let csv_path = temp_dir.path().join("units.csv");
    export::export_csv_file(&answer.to_result(), &csv_path).expect("should export");
    assert_eq!(
        std::fs::read_to_string(&csv_path).expect("should read csv"),
        "month,units\njan,10\nfeb,25\nmar,40\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_sql_and_pie_chart_share_the_upload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let services = start_services("SELECT 1").await;
    let askdb = build_askdb(&services, &temp_dir.path().join("askdb")).await;
    let source = create_database(temp_dir.path()).await;
    let summary = askdb.upload(&source).await.expect("upload should succeed");

    let result = askdb
        .run_sql(
            Some(&summary.upload.id),
            "SELECT region, SUM(units) AS total FROM monthly_sales GROUP BY region ORDER BY region",
        )
        .await
        .expect("query should run");
    assert_eq!(result.columns, vec!["region", "total"]);
    assert_eq!(result.rows[0], vec![Value::Null, Value::Integer(40)]);

    let pie = askdb
        .visualize(
            Some(&summary.upload.id),
            "SELECT region, SUM(units) AS total FROM monthly_sales GROUP BY region ORDER BY region",
            "pie",
            Some("region"),
            Some("total"),
        )
        .await
        .expect("pie should render");
    assert_eq!(pie.spec.values, vec![40.0, 35.0]);
    assert_eq!(pie.spec.labels, vec!["NULL", "north"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_translation_reports_the_sql() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let services = start_services("SELECT units FROM no_such_table").await;
    let askdb = build_askdb(&services, &temp_dir.path().join("askdb")).await;
    let source = create_database(temp_dir.path()).await;
    askdb.upload(&source).await.expect("upload should succeed");

    let error = askdb
        .ask(None, "units please")
        .await
        .expect_err("execution should fail");

    match error {
        AskDbError::Execution { sql, message } => {
            assert_eq!(sql, "SELECT units FROM no_such_table");
            assert!(message.contains("no such table"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_outage_leaves_nothing_behind() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let services = Services {
        ollama: MockServer::start().await,
        llm: MockServer::start().await,
    };
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&services.ollama)
        .await;

    let askdb = build_askdb(&services, &temp_dir.path().join("askdb")).await;
    let source = create_database(temp_dir.path()).await;

    let error = askdb.upload(&source).await.expect_err("upload should fail");

    assert!(error.is_retryable());
    assert!(askdb.list().await.expect("list").is_empty());
    let leftovers = std::fs::read_dir(askdb.uploads_dir())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}
