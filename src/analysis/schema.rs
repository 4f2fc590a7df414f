//! Scalar-only projection of the table.
//!
//! The analysis engine only understands scalar cells. Any column holding a
//! list or an object in at least one row is excluded as a whole and
//! reported once.

use crate::models::Table;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Inferred type of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Boolean,
    Text,
    /// Every cell is null or missing.
    Empty,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Number => write!(f, "number"),
            ColumnKind::Boolean => write!(f, "boolean"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Empty => write!(f, "empty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Rows restricted to scalar columns, cells aligned with `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarProjection {
    pub columns: Vec<ProjectedColumn>,
    pub rows: Vec<Vec<Value>>,
    /// Columns excluded because they hold lists or objects.
    #[serde(skip)]
    pub dropped: Vec<String>,
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Build the scalar projection of `table`.
pub fn scalar_projection(table: &Table) -> ScalarProjection {
    let non_scalar: HashSet<&str> = table
        .records()
        .iter()
        .flat_map(|r| r.fields.iter())
        .filter(|(_, v)| !is_scalar(v))
        .map(|(k, _)| k.as_str())
        .collect();

    let mut dropped = Vec::new();
    let mut kept = Vec::new();
    for column in table.columns() {
        if non_scalar.contains(column.as_str()) {
            warn!(
                "Column '{}' holds non-scalar values and is excluded from analysis",
                column
            );
            dropped.push(column.clone());
        } else {
            kept.push(column.as_str());
        }
    }

    let rows: Vec<Vec<Value>> = table
        .records()
        .iter()
        .map(|r| {
            kept.iter()
                .map(|c| r.field(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    let columns = kept
        .iter()
        .enumerate()
        .map(|(i, name)| ProjectedColumn {
            name: name.to_string(),
            kind: infer_kind(rows.iter().map(|row| &row[i])),
        })
        .collect();

    ScalarProjection {
        columns,
        rows,
        dropped,
    }
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind = ColumnKind::Empty;

    for cell in cells {
        let cell_kind = match cell {
            Value::Null => continue,
            Value::Number(_) => ColumnKind::Number,
            Value::Bool(_) => ColumnKind::Boolean,
            _ => ColumnKind::Text,
        };

        kind = match kind {
            ColumnKind::Empty => cell_kind,
            current if current == cell_kind => current,
            _ => return ColumnKind::Text,
        };
    }

    kind
}
