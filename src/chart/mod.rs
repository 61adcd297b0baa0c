// Chart module
// Shapes query results into a category/value series and renders them as images


pub mod svg;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::execution::{QueryResult, Value};
use crate::{AskDbError, Result};

pub use svg::SvgRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartKind {
    pub const ALL: [Self; 4] = [Self::Bar, Self::Line, Self::Pie, Self::Scatter];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
        }
    }

    /// Whether the chart is drawn on x/y axes
    #[inline]
    pub fn has_axes(self) -> bool {
        !matches!(self, Self::Pie)
    }
}

impl FromStr for ChartKind {
    type Err = AskDbError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AskDbError::UnsupportedChartKind(s.to_string()))
    }
}

impl fmt::Display for ChartKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a renderer needs to draw one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Stringified x values, one per point
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl ChartSpec {
    #[inline]
    pub fn x_column(&self) -> &str {
        &self.x_label
    }

    #[inline]
    pub fn y_column(&self) -> &str {
        &self.y_label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encoded chart image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ChartImage {
    /// `data:<mime>;base64,<payload>`, embeddable in HTML or JSON
    #[inline]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    #[inline]
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Turns a [`ChartSpec`] into image bytes
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: &ChartSpec) -> Result<ChartImage>;
}

/// Derive the chart series from `result`.
///
/// A missing x choice falls back to the first column (other than y when y was
/// named). A missing y choice falls back to the first numeric column other than
/// x, or x itself when it is the only numeric column. A column is numeric when
/// every value is an integer, a real or NULL and at least one is not NULL.
/// Rows whose y value is NULL are left out of the series.
#[inline]
pub fn shape_chart(
    result: &QueryResult,
    x_column: Option<&str>,
    y_column: Option<&str>,
    kind: ChartKind,
) -> Result<ChartSpec> {
    if result.columns.is_empty() || result.rows.is_empty() {
        return Err(AskDbError::EmptyResult);
    }

    let x_column = x_column.filter(|name| !name.is_empty());
    let y_column = y_column.filter(|name| !name.is_empty());

    let named_y = y_column.map(|name| column_index(result, name)).transpose()?;

    let x = match x_column {
        Some(name) => column_index(result, name)?,
        None => (0..result.columns.len())
            .find(|&i| Some(i) != named_y)
            .unwrap_or(0),
    };

    let y = match named_y {
        Some(index) => {
            if !is_numeric_column(result, index) {
                return Err(AskDbError::NonNumericColumn(result.columns[index].clone()));
            }
            index
        }
        None => (0..result.columns.len())
            .filter(|&i| i != x)
            .find(|&i| is_numeric_column(result, i))
            .or_else(|| is_numeric_column(result, x).then_some(x))
            .ok_or(AskDbError::NoNumericColumn)?,
    };

    let (labels, values): (Vec<String>, Vec<f64>) = result
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.get(y)?.as_f64()?;
            let label = row.get(x).map(Value::to_string).unwrap_or_default();
            Some((label, value))
        })
        .unzip();

    let x_name = result.columns[x].clone();
    let y_name = result.columns[y].clone();
    debug!(
        "Shaped {} chart: {} by {} ({} points)",
        kind,
        y_name,
        x_name,
        values.len()
    );

    Ok(ChartSpec {
        kind,
        labels,
        values,
        title: format!("{} by {}", y_name, x_name),
        x_label: x_name,
        y_label: y_name,
    })
}

/// Render `spec` with `renderer`
#[inline]
pub fn render_chart(spec: &ChartSpec, renderer: &dyn ChartRenderer) -> Result<ChartImage> {
    renderer.render(spec)
}

fn column_index(result: &QueryResult, name: &str) -> Result<usize> {
    result
        .column_index(name)
        .ok_or_else(|| AskDbError::UnknownColumn(name.to_string()))
}

fn is_numeric_column(result: &QueryResult, index: usize) -> bool {
    let mut saw_number = false;
    for value in result.column_values(index) {
        match value {
            Value::Integer(_) | Value::Real(_) => saw_number = true,
            Value::Null => {}
            Value::Text(_) | Value::Blob(_) => return false,
        }
    }
    saw_number
}
