use anyhow::Result;
use askdb::commands::{
    AskOptions, ask_question, chart_query, export_query, list_databases, show_status, show_tables,
    upload_database,
};
use askdb::config::{run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask questions about SQLite databases in plain language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service, language model and retrieval
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload a SQLite database (.db) and index its schema
    Upload {
        /// Path to the .db file
        file: PathBuf,
    },
    /// List uploaded databases
    List,
    /// Show tables and preview rows of a database
    Tables {
        /// Database ID; defaults to the most recent upload
        #[arg(long)]
        db: Option<String>,
    },
    /// Ask a question in plain language
    Ask {
        question: String,
        /// Database ID; defaults to the most recent upload
        #[arg(long)]
        db: Option<String>,
        /// Also chart the result: bar, line, pie or scatter
        #[arg(long)]
        chart: Option<String>,
        /// Column for chart labels
        #[arg(long)]
        x: Option<String>,
        /// Numeric column for chart values
        #[arg(long)]
        y: Option<String>,
        /// Where to write the chart image
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also export the result as CSV to this file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Chart the result of a SQL query
    Chart {
        sql: String,
        /// bar, line, pie or scatter
        #[arg(long)]
        kind: String,
        #[arg(long)]
        db: Option<String>,
        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        y: Option<String>,
        /// Where to write the chart image
        #[arg(long)]
        out: PathBuf,
    },
    /// Export the result of a SQL query as CSV
    Export {
        sql: String,
        /// Destination CSV file
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        db: Option<String>,
    },
    /// Show the status of every service askdb depends on
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Upload { file } => {
            upload_database(&file).await?;
        }
        Commands::List => {
            list_databases().await?;
        }
        Commands::Tables { db } => {
            show_tables(db).await?;
        }
        Commands::Ask {
            question,
            db,
            chart,
            x,
            y,
            out,
            csv,
        } => {
            ask_question(AskOptions {
                question,
                database: db,
                chart,
                x_column: x,
                y_column: y,
                chart_out: out,
                csv_out: csv,
            })
            .await?;
        }
        Commands::Chart {
            sql,
            kind,
            db,
            x,
            y,
            out,
        } => {
            chart_query(&sql, &kind, db, x, y, &out).await?;
        }
        Commands::Export { sql, out, db } => {
            export_query(&sql, &out, db).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
