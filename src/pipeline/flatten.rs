//! Turns raw replies into structured rows
//!
//! A successful reply must parse as a JSON array of objects. Anything else
//! fails the whole reply: no partially valid entries are kept.

use super::types::{FailureRecord, FlattenedRow, RawResultRecord, RequestStatus};
use crate::config::FieldMapping;
use crate::error::Result;
use crate::storage::AtomicCsvWriter;
use serde_json::{Map, Value};
use std::path::Path;

/// Column used for the whole entry when no mapping is configured.
pub const RAW_JSON_COLUMN: &str = "raw_json";

/// Structured rows of a chunk together with their mapped column names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlattenedTable {
    pub columns: Vec<String>,
    pub rows: Vec<FlattenedRow>,
}

impl FlattenedTable {
    /// Header row: the identifiers followed by the mapped columns.
    pub fn header(&self) -> Vec<String> {
        ["request_id", "unit_id"]
            .iter()
            .map(|c| c.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlattenOutput {
    pub table: FlattenedTable,
    pub failures: Vec<FailureRecord>,
}

/// A parsed reply entry. Fields are looked up explicitly; a missing key is
/// `None`, never an error.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a>(&'a Map<String, Value>);

impl<'a> Entry<'a> {
    pub fn field(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key)
    }
}

pub fn flatten_results(records: &[RawResultRecord], mapping: &[FieldMapping]) -> FlattenOutput {
    let columns = if mapping.is_empty() {
        vec![RAW_JSON_COLUMN.to_string()]
    } else {
        mapping.iter().map(|m| m.column.clone()).collect()
    };

    let mut output = FlattenOutput {
        table: FlattenedTable {
            columns,
            rows: Vec::new(),
        },
        failures: Vec::new(),
    };

    for record in records {
        let failure = |error: String| FailureRecord {
            request_id: record.request_id,
            unit_id: record.unit_id.clone(),
            error,
        };

        let payload = match (record.status, record.payload.as_deref()) {
            (RequestStatus::Success, Some(payload)) => payload,
            (RequestStatus::Success, None) => {
                output.failures.push(failure("No response payload".to_string()));
                continue;
            }
            (RequestStatus::Failed, _) => {
                let error = record
                    .error
                    .clone()
                    .unwrap_or_else(|| "No response object".to_string());
                output.failures.push(failure(error));
                continue;
            }
        };

        match parse_entries(payload) {
            Ok(entries) => {
                output
                    .table
                    .rows
                    .extend(entries.into_iter().map(|entry| FlattenedRow {
                        request_id: record.request_id,
                        unit_id: record.unit_id.clone(),
                        values: map_entry(entry, mapping),
                    }));
            }
            Err(reason) => output.failures.push(failure(reason)),
        }
    }

    output
}

/// Parses a reply as a list of key/value entries.
pub fn parse_entries(payload: &str) -> std::result::Result<Vec<Map<String, Value>>, String> {
    let value: Value = serde_json::from_str(strip_code_fence(payload))
        .map_err(|e| format!("Invalid JSON in response: {e}"))?;

    let Value::Array(items) = value else {
        return Err("Unexpected JSON format (not a list)".to_string());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(format!("Unexpected JSON format (entry {i} is not an object)")),
        })
        .collect()
}

fn map_entry(entry: Map<String, Value>, mapping: &[FieldMapping]) -> Vec<Option<Value>> {
    if mapping.is_empty() {
        return vec![Some(Value::String(Value::Object(entry).to_string()))];
    }

    let entry_ref = Entry(&entry);
    mapping
        .iter()
        .map(|m| entry_ref.field(&m.field).cloned())
        .collect()
}

/// Unwraps replies of the form ```` ```json\n[...]\n``` ````.
fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Renders one cell; absent and `null` values become empty cells.
pub fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Writes the structured document. The header is written even when the
/// table has no rows.
pub fn write_structured(path: &Path, table: &FlattenedTable) -> Result<()> {
    let mut writer = AtomicCsvWriter::new(path)?;
    writer.write_record(table.header())?;
    for row in &table.rows {
        let mut cells = vec![row.request_id.to_string(), row.unit_id.clone()];
        cells.extend(row.values.iter().map(|v| render_cell(v.as_ref())));
        writer.write_record(cells)?;
    }
    writer.finish()?;
    Ok(())
}

pub fn write_failures(path: &Path, failures: &[FailureRecord]) -> Result<()> {
    let mut writer = AtomicCsvWriter::new(path)?;
    writer.write_record(["request_id", "unit_id", "error"])?;
    for failure in failures {
        writer.write_record([
            failure.request_id.to_string(),
            failure.unit_id.clone(),
            failure.error.clone(),
        ])?;
    }
    writer.finish()?;
    Ok(())
}
