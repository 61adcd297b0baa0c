// Export module
// Writes query results as CSV


use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::execution::{QueryResult, Value};
use crate::{AskDbError, Result};

/// Write `result` as CSV: a header row of column names, then one record per row.
///
/// NULL becomes an empty field and blobs are hex encoded.
#[inline]
pub fn export_csv<W: Write>(result: &QueryResult, writer: W) -> Result<()> {
    ensure_exportable(result)?;

    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(&result.columns)
        .map_err(|e| AskDbError::Export(format!("Failed to write CSV header: {}", e)))?;

    for row in &result.rows {
        csv_writer
            .write_record(row.iter().map(csv_field))
            .map_err(|e| AskDbError::Export(format!("Failed to write CSV row: {}", e)))?;
    }

    csv_writer
        .flush()
        .map_err(|e| AskDbError::Export(format!("Failed to flush CSV output: {}", e)))?;

    Ok(())
}

/// CSV text of `result`
#[inline]
pub fn to_csv_string(result: &QueryResult) -> Result<String> {
    let mut buffer = Vec::new();
    export_csv(result, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| AskDbError::Export(format!("CSV output is not valid UTF-8: {}", e)))
}

/// Write `result` to a CSV file at `path`
#[inline]
pub fn export_csv_file(result: &QueryResult, path: &Path) -> Result<()> {
    ensure_exportable(result)?;
    let file = std::fs::File::create(path).map_err(|e| {
        AskDbError::Export(format!("Failed to create {}: {}", path.display(), e))
    })?;
    export_csv(result, file)?;
    info!("Exported {} rows to {}", result.rows.len(), path.display());
    Ok(())
}

fn ensure_exportable(result: &QueryResult) -> Result<()> {
    if result.columns.is_empty() || result.rows.is_empty() {
        return Err(AskDbError::Export("No data to export".to_string()));
    }
    Ok(())
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
