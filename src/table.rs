//! CSV input tables
//!
//! The input is read fully into memory; the grouping step needs every row
//! before the first chunk can be planned.

use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

const UTF8_BOM: &str = "\u{feff}";

/// A header row plus its records.
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl InputTable {
    /// Builds a table from string slices, mostly useful in tests.
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: StringRecord::from(headers.to_vec()),
            records: rows
                .iter()
                .map(|row| StringRecord::from(row.to_vec()))
                .collect(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", path.display(), e),
            ))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: StringRecord = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h })
            .collect();

        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| Error::Validation(format!("input has no column named '{name}'")))
    }
}
