// Execution module
// Runs one SQL statement against an uploaded database on a fresh connection


use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, SqliteConnection, TypeInfo, ValueRef};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::{AskDbError, Result};

/// One scalar cell of a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Numeric view of the value; `None` for NULL, text and blobs
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Integer(i) => Some(i as f64),
            Self::Real(f) => Some(f),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Text(s) => write!(f, "{}", s),
            Self::Blob(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Column names plus rows, in the order SQLite produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom
    #[inline]
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}

/// Execute `sql` against the SQLite file at `path`.
///
/// Opens a dedicated connection and closes it before returning. Statements without a
/// result set yield an empty column list. There is no implicit transaction, so DDL and
/// DML take effect immediately.
#[inline]
pub async fn execute(path: &Path, sql: &str) -> Result<QueryResult> {
    debug!("Executing against {}: {}", path.display(), sql);

    if count_statements(sql) > 1 {
        return Err(AskDbError::Execution {
            sql: sql.to_string(),
            message: "You can only execute one statement at a time.".to_string(),
        });
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false);

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| execution_error(sql, &e))?;

    let outcome = run_statement(&mut conn, sql).await;

    if let Err(e) = conn.close().await {
        debug!("Failed to close connection cleanly: {}", e);
    }

    let result = outcome?;
    info!(
        "Query returned {} rows across {} columns",
        result.rows.len(),
        result.columns.len()
    );
    Ok(result)
}

async fn run_statement(conn: &mut SqliteConnection, sql: &str) -> Result<QueryResult> {
    let rows = (&mut *conn)
        .fetch_all(sql)
        .await
        .map_err(|e| execution_error(sql, &e))?;

    let columns = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        // Zero rows: the prepared statement still knows its result columns
        None => match (&mut *conn).describe(sql).await {
            Ok(description) => description
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe statement after execution: {}", e);
                Vec::new()
            }
        },
    };

    let rows = rows
        .iter()
        .map(|row| decode_row(row, sql))
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryResult { columns, rows })
}

fn decode_row(row: &SqliteRow, sql: &str) -> Result<Vec<Value>> {
    (0..row.len())
        .map(|index| decode_value(row, index).map_err(|e| execution_error(sql, &e)))
        .collect()
}

fn decode_value(row: &SqliteRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;

    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(Value::Integer),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(Value::Real),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Blob),
        // SQLite does not enforce UTF-8 on TEXT, so invalid bytes are replaced
        _ => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::Text(text_from_bytes(bytes))),
    }
}

fn text_from_bytes(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Number of non-empty statements in `sql`.
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// `CREATE TRIGGER ... END` bodies do not separate statements.
pub(crate) fn count_statements(sql: &str) -> usize {
    let mut count = 0;
    let mut has_content = false;
    let mut leading_words: Vec<String> = Vec::new();
    let mut last_word: Option<String> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '-' if chars.peek().is_some_and(|&(_, next)| next == '-') => {
                for (_, skipped) in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek().is_some_and(|&(_, next)| next == '*') => {
                chars.next();
                let mut previous = '\0';
                for (_, skipped) in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
            }
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                for (_, skipped) in chars.by_ref() {
                    if skipped == close {
                        break;
                    }
                }
                has_content = true;
                last_word = None;
            }
            ';' => {
                if is_trigger(&leading_words) && last_word.as_deref() != Some("END") {
                    last_word = None;
                    continue;
                }
                if has_content {
                    count += 1;
                }
                has_content = false;
                leading_words.clear();
                last_word = None;
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                let mut word = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = word.to_ascii_uppercase();
                if leading_words.len() < 4 {
                    leading_words.push(word.clone());
                }
                has_content = true;
                last_word = Some(word);
            }
            _ => {
                has_content = true;
                last_word = None;
            }
        }
    }

    if has_content {
        count += 1;
    }
    count
}

fn is_trigger(leading_words: &[String]) -> bool {
    let words = match leading_words.first().map(String::as_str) {
        Some("EXPLAIN") => &leading_words[1..],
        _ => leading_words,
    };
    match words {
        [create, trigger, ..] if create == "CREATE" && trigger == "TRIGGER" => true,
        [create, temp, trigger, ..] => {
            create == "CREATE"
                && (temp == "TEMP" || temp == "TEMPORARY")
                && trigger == "TRIGGER"
        }
        _ => false,
    }
}

fn execution_error(sql: &str, error: &sqlx::Error) -> AskDbError {
    let message = match error {
        sqlx::Error::Database(db_error) => db_error.message().to_string(),
        other => other.to_string(),
    };
    AskDbError::Execution {
        sql: sql.to_string(),
        message,
    }
}
