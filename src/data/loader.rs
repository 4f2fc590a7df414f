//! JSON record loading.
//!
//! Reads an array of (possibly nested) records, flattens nested objects
//! into dotted-key columns, keeps only rows that carry every required field
//! and derives the synthetic `station_id`.

use crate::error::LoadError;
use crate::models::{
    value_text, StationRecord, Table, ADDRESS_COLUMN, REVIEWS_COUNT_COLUMN, STATION_ID_COLUMN,
    TOTAL_SCORE_COLUMN, VENDOR_COLUMN,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Load and filter the table stored at `path`.
pub fn load_table(path: &Path) -> Result<Table, LoadError> {
    info!("Loading station data from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: Value = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    table_from_value(document)
}

/// Build a table from an already parsed JSON document.
pub fn table_from_value(document: Value) -> Result<Table, LoadError> {
    let items = match document {
        Value::Array(items) => items,
        other => {
            return Err(LoadError::Structure(format!(
                "expected an array of records, found {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let mut columns = Vec::new();
    let mut seen_columns = HashSet::new();
    let mut records = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        let object = match item {
            Value::Object(object) => object,
            other => {
                return Err(LoadError::Structure(format!(
                    "record {} is {}, expected an object",
                    index,
                    json_kind(&other)
                )))
            }
        };

        let mut fields = Map::new();
        flatten_into(None, object, &mut fields);

        for key in fields.keys() {
            if seen_columns.insert(key.clone()) {
                columns.push(key.clone());
            }
        }

        if let Some(record) = build_record(index, fields)? {
            records.push(record);
        }
    }

    if seen_columns.insert(STATION_ID_COLUMN.to_string()) {
        columns.push(STATION_ID_COLUMN.to_string());
    }

    info!(
        "Loaded {} records, {} retained after filtering incomplete rows",
        total,
        records.len()
    );

    Ok(Table::new(columns, records))
}

/// Flatten nested objects into `parent.child` keys. Arrays are kept whole.
fn flatten_into(prefix: Option<&str>, object: Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let column = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key,
        };

        match value {
            Value::Object(nested) => flatten_into(Some(&column), nested, out),
            scalar_or_array => {
                out.insert(column, scalar_or_array);
            }
        }
    }
}

/// Returns `Ok(None)` when a required field is missing or null.
fn build_record(index: usize, mut fields: Map<String, Value>) -> Result<Option<StationRecord>, LoadError> {
    let required = [
        VENDOR_COLUMN,
        ADDRESS_COLUMN,
        REVIEWS_COUNT_COLUMN,
        TOTAL_SCORE_COLUMN,
    ];

    if let Some(missing) = required
        .iter()
        .find(|name| fields.get(**name).map_or(true, Value::is_null))
    {
        debug!("Skipping record {}: missing '{}'", index, missing);
        return Ok(None);
    }

    let vendor = value_text(&fields[VENDOR_COLUMN]);
    let address = value_text(&fields[ADDRESS_COLUMN]);

    let reviews_count =
        parse_count(&fields[REVIEWS_COUNT_COLUMN]).ok_or(LoadError::InvalidField {
            index,
            field: REVIEWS_COUNT_COLUMN,
            expected: "non-negative whole number",
        })?;

    let total_score = parse_score(&fields[TOTAL_SCORE_COLUMN]).ok_or(LoadError::InvalidField {
        index,
        field: TOTAL_SCORE_COLUMN,
        expected: "number",
    })?;

    let station_id = StationRecord::make_station_id(&vendor, &address);
    fields.insert(
        STATION_ID_COLUMN.to_string(),
        Value::String(station_id.clone()),
    );

    Ok(Some(StationRecord {
        vendor,
        address,
        reviews_count,
        total_score,
        station_id,
        fields,
    }))
}

fn parse_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }

    let float = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<u64>() {
                return Some(n);
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    // `u64::MAX as f64` rounds up to 2^64, the first value that no longer fits.
    if float.is_finite() && float >= 0.0 && float < u64::MAX as f64 && float.fract() == 0.0 {
        Some(float as u64)
    } else {
        None
    }
}

fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    score.is_finite().then_some(score)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
