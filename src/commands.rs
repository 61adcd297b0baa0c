use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::chart::ChartKind;
use crate::config::Config;
use crate::database::{Database, VectorIndex, VectorStore};
use crate::embeddings::OllamaClient;
use crate::execution::Value;
use crate::export::export_csv_file;
use crate::llm::ChatClient;
use crate::pipeline::{AskDb, TablePreview};

/// Cells wider than this are cut short in terminal tables
const MAX_CELL_WIDTH: usize = 40;

/// Options for `askdb ask`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskOptions {
    pub question: String,
    pub database: Option<String>,
    pub chart: Option<String>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub chart_out: Option<PathBuf>,
    pub csv_out: Option<PathBuf>,
}

async fn open_pipeline() -> Result<AskDb> {
    let config = Config::load_default()?;
    AskDb::from_config(&config)
        .await
        .context("Failed to initialize askdb")
}

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Upload and index a SQLite database file
#[inline]
pub async fn upload_database(file: &Path) -> Result<()> {
    let askdb = open_pipeline().await?;

    let bar = spinner(&format!("Indexing {}", file.display()));
    let summary = askdb.upload(file).await;
    bar.finish_and_clear();
    let summary = summary?;

    println!(
        "{} {} (ID: {})",
        style("Database uploaded successfully:").green(),
        summary.upload.original_filename,
        summary.upload.id
    );
    println!("   Tables: {}", summary.tables.len());
    println!("   Schema documents indexed: {}", summary.indexed);
    println!();
    print_previews(&summary.tables);

    Ok(())
}

/// List uploaded databases, most recent first
#[inline]
pub async fn list_databases() -> Result<()> {
    let config = Config::load_default()?;
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;

    let uploads = database
        .list_uploads()
        .await
        .context("Failed to list uploads")?;

    if uploads.is_empty() {
        println!("No databases have been uploaded yet.");
        println!("Use 'askdb upload <file.db>' to add one.");
        return Ok(());
    }

    println!("Uploaded Databases ({} total):", uploads.len());
    println!();

    for (i, upload) in uploads.iter().enumerate() {
        let marker = if i == 0 { " (current)" } else { "" };
        println!("🗄️  {}{}", upload.original_filename, marker);
        println!("   ID: {}", upload.id);
        println!("   Tables: {}", upload.table_count);
        println!(
            "   Uploaded: {}",
            upload.uploaded_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !upload.path_buf().is_file() {
            println!("   {}", style("File missing").red());
        }
        println!();
    }

    Ok(())
}

/// Show the tables of a database with their first rows
#[inline]
pub async fn show_tables(database: Option<String>) -> Result<()> {
    let askdb = open_pipeline().await?;
    let (upload, tables) = askdb.tables(database.as_deref()).await?;

    println!("📋 {} (ID: {})", upload.original_filename, upload.id);
    println!();
    if tables.is_empty() {
        println!("   No tables found");
        return Ok(());
    }
    print_previews(&tables);

    Ok(())
}

/// Answer a question, optionally charting or exporting the result
#[inline]
pub async fn ask_question(options: AskOptions) -> Result<()> {
    // Reject a bad chart kind before spending a model call
    let chart_kind = options
        .chart
        .as_deref()
        .map(str::parse::<ChartKind>)
        .transpose()?;

    let askdb = open_pipeline().await?;

    let bar = spinner("Translating question");
    let answer = askdb
        .ask(options.database.as_deref(), &options.question)
        .await;
    bar.finish_and_clear();
    let answer = answer?;

    println!("{} {}", style("SQL:").bold(), answer.sql);
    println!();
    print!("{}", format_table(&answer.columns, &answer.rows));
    println!("({} rows)", answer.row_count);

    let result = answer.to_result();

    if let Some(csv_path) = &options.csv_out {
        export_csv_file(&result, csv_path)?;
        println!("Exported results to {}", csv_path.display());
    }

    if let Some(kind) = chart_kind {
        let chart = askdb.chart(
            &result,
            kind,
            options.x_column.as_deref(),
            options.y_column.as_deref(),
        )?;
        let out = options
            .chart_out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("chart.{}", extension_for(&chart.image.mime_type))));
        chart.image.write_to(&out)?;
        println!(
            "Saved {} chart of {} by {} to {}",
            chart.kind,
            chart.y_column,
            chart.x_column,
            out.display()
        );
    }

    Ok(())
}

/// Run SQL and save a chart of the result
#[inline]
pub async fn chart_query(
    sql: &str,
    kind: &str,
    database: Option<String>,
    x_column: Option<String>,
    y_column: Option<String>,
    out: &Path,
) -> Result<()> {
    let askdb = open_pipeline().await?;

    let chart = askdb
        .visualize(
            database.as_deref(),
            sql,
            kind,
            x_column.as_deref(),
            y_column.as_deref(),
        )
        .await?;

    chart.image.write_to(out)?;
    info!("Wrote {} bytes to {}", chart.image.bytes.len(), out.display());
    println!(
        "Saved {} chart of {} by {} ({} points) to {}",
        chart.kind,
        chart.y_column,
        chart.x_column,
        chart.spec.len(),
        out.display()
    );

    Ok(())
}

/// Run SQL and write the result as CSV
#[inline]
pub async fn export_query(sql: &str, out: &Path, database: Option<String>) -> Result<()> {
    let askdb = open_pipeline().await?;
    let result = askdb.run_sql(database.as_deref(), sql).await?;

    export_csv_file(&result, out)?;
    println!("Exported {} rows to {}", result.row_count(), out.display());

    Ok(())
}

/// Health of every service askdb depends on
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().unwrap_or_default();

    println!("📊 askdb Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Registry Status:");
    let database = match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(db) => {
            println!("   ✅ SQLite: Connected ({})", config.database_path().display());
            Some(db)
        }
        Err(e) => {
            println!("   ❌ SQLite: Failed to connect - {}", e);
            None
        }
    };

    println!("🤖 Embedding Service Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match tokio::task::spawn_blocking(move || client.health_check()).await {
            Ok(Ok(())) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Ok(Err(e)) => println!("   ⚠️  Ollama: Unhealthy - {}", e),
            Err(e) => println!("   ❌ Ollama: Health check did not finish - {}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }

    println!("🧠 Language Model Status:");
    match ChatClient::new(&config.llm) {
        Ok(client) => {
            println!("   🌐 Endpoint: {}", client.endpoint());
            println!("   📋 Model: {}", config.llm.model);
            if client.has_api_key() {
                println!("   ✅ API key: {} is set", config.llm.api_key_env);
            } else {
                println!("   ❌ API key: {} is not set", config.llm.api_key_env);
            }
        }
        Err(e) => println!("   ❌ Invalid configuration - {}", e),
    }

    println!("🔍 Vector Index Status:");
    match VectorStore::new(&config).await {
        Ok(store) => match store.count(None).await {
            Ok(count) => println!("   ✅ LanceDB: {} schema embeddings", count),
            Err(e) => println!("   ⚠️  LanceDB: Connected but unreadable - {}", e),
        },
        Err(e) => println!("   ❌ LanceDB: Failed to connect - {}", e),
    }

    if let Some(database) = database {
        println!();
        println!("📚 Uploads:");
        match database.list_uploads().await {
            Ok(uploads) if uploads.is_empty() => println!("   📭 No databases uploaded yet"),
            Ok(uploads) => {
                let missing = uploads.iter().filter(|u| !u.path_buf().is_file()).count();
                println!("   📊 Total: {}", uploads.len());
                if let Some(latest) = uploads.first() {
                    println!("   📌 Current: {} ({})", latest.original_filename, latest.id);
                }
                if missing > 0 {
                    warn!("{} uploaded files are missing", missing);
                    println!("   ❌ Missing files: {}", missing);
                }
            }
            Err(e) => println!("   ❌ Failed to load uploads: {}", e),
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'askdb upload <file.db>' to add a database");
    println!("   • Use 'askdb ask \"<question>\"' to query the current database");
    println!("   • Use 'askdb config' to change services and models");

    Ok(())
}

fn print_previews(tables: &[TablePreview]) {
    for table in tables {
        println!("{}", style(format!("Table: {}", table.name)).bold());
        if table.preview.columns.is_empty() {
            println!("   (preview unavailable)");
        } else {
            print!("{}", format_table(&table.preview.columns, &table.preview.rows));
        }
        println!();
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/svg+xml" => "svg",
        "image/png" => "png",
        _ => "bin",
    }
}

/// Render rows as a plain text table with aligned columns
#[inline]
pub fn format_table(columns: &[String], rows: &[Vec<Value>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|value| truncate_cell(&value.to_string())).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    write_row(&mut output, columns.iter().map(String::as_str), &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(&mut output, separator.iter().map(String::as_str), &widths);
    for row in &cells {
        write_row(&mut output, row.iter().map(String::as_str), &widths);
    }
    output
}

fn write_row<'a>(output: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    let _ = writeln!(output, "{}", line.join(" | ").trim_end());
}

fn truncate_cell(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        single_line
    } else {
        let mut cut: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
        cut.push('…');
        cut
    }
}
