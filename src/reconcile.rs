//! Attaches merged model labels to the original input rows
//!
//! Each classified row's id field (`"12_3"`) is cut at the first separator
//! to recover the original key (`"12"`). Original rows are then left-joined
//! with every classified row sharing that key; rows with no match are kept
//! once with empty model columns.

use crate::error::{Error, Result};
use crate::storage::AtomicCsvWriter;
use crate::table::InputTable;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Key column in the original table.
    pub key_column: String,
    /// Column in the classified table holding the sentence id.
    pub id_field: String,
    /// Appended to every model column name.
    pub suffix: String,
    pub separator: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            key_column: "id".to_string(),
            id_field: "id".to_string(),
            suffix: "_model".to_string(),
            separator: "_".to_string(),
        }
    }
}

/// Header and rows of the joined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub matched: usize,
}

const ID_COLUMNS: [&str; 2] = ["request_id", "unit_id"];

pub fn reconcile(
    original: &InputTable,
    classified: &InputTable,
    options: &ReconcileOptions,
) -> Result<Reconciled> {
    if options.separator.is_empty() {
        return Err(Error::Validation("separator must not be empty".into()));
    }
    let key_idx = original.require_column(&options.key_column)?;
    let id_idx = classified.require_column(&options.id_field)?;

    let model_columns: Vec<(usize, String)> = classified
        .headers()
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != id_idx && !ID_COLUMNS.contains(name))
        .map(|(i, name)| (i, format!("{}{}", name, options.suffix)))
        .collect();

    let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, record) in classified.records().iter().enumerate() {
        let id = record.get(id_idx).unwrap_or_default();
        let key = id.split(options.separator.as_str()).next().unwrap_or(id);
        by_key.entry(key).or_default().push(row);
    }

    let mut header: Vec<String> = original.headers().iter().map(str::to_string).collect();
    header.extend(model_columns.iter().map(|(_, name)| name.clone()));

    let mut rows = Vec::new();
    let mut matched = 0;
    for record in original.records() {
        let base: Vec<String> = (0..original.headers().len())
            .map(|i| record.get(i).unwrap_or_default().to_string())
            .collect();
        let key = record.get(key_idx).unwrap_or_default();

        match by_key.get(key) {
            Some(matches) => {
                matched += 1;
                for &row in matches {
                    let labels = &classified.records()[row];
                    let mut joined = base.clone();
                    joined.extend(
                        model_columns
                            .iter()
                            .map(|(i, _)| labels.get(*i).unwrap_or_default().to_string()),
                    );
                    rows.push(joined);
                }
            }
            None => {
                let mut joined = base;
                joined.extend(std::iter::repeat(String::new()).take(model_columns.len()));
                rows.push(joined);
            }
        }
    }

    Ok(Reconciled {
        header,
        rows,
        matched,
    })
}

pub fn reconcile_files(
    input: &Path,
    classified: &Path,
    output: &Path,
    options: &ReconcileOptions,
) -> Result<Reconciled> {
    info!("Original CSV: {}", input.display());
    info!("Classified CSV: {}", classified.display());

    let original = InputTable::from_path(input)?;
    let labels = InputTable::from_path(classified)?;
    let reconciled = reconcile(&original, &labels, options)?;

    let mut writer = AtomicCsvWriter::new(output)?;
    writer.write_record(&reconciled.header)?;
    for row in &reconciled.rows {
        writer.write_record(row)?;
    }
    writer.finish()?;

    info!(
        "Merged file saved to: {} ({} of {} original rows labelled)",
        output.display(),
        reconciled.matched,
        original.len()
    );
    Ok(reconciled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn original() -> InputTable {
        InputTable::from_rows(
            &["id", "sentence", "pressure"],
            &[
                &["1", "Rivers dry up.", "drought"],
                &["2", "Forests regrow.", ""],
                &["3", "Nothing labelled.", ""],
            ],
        )
    }

    fn classified() -> InputTable {
        InputTable::from_rows(
            &["request_id", "unit_id", "id", "pressure", "sentiment"],
            &[
                &["0", "1", "1_1", "drought", "negative"],
                &["1", "2", "2_1", "none", "positive"],
            ],
        )
    }

    #[test]
    fn test_left_join_with_suffix() {
        let reconciled = reconcile(&original(), &classified(), &ReconcileOptions::default()).unwrap();

        assert_eq!(
            reconciled.header,
            vec!["id", "sentence", "pressure", "pressure_model", "sentiment_model"]
        );
        assert_eq!(reconciled.rows.len(), 3);
        assert_eq!(reconciled.rows[0][3..], ["drought", "negative"]);
        assert_eq!(reconciled.rows[2][3..], ["", ""]);
        assert_eq!(reconciled.matched, 2);
    }

    #[test]
    fn test_multiple_sentences_per_key_expand_rows() {
        let classified = InputTable::from_rows(
            &["id", "label"],
            &[&["1_1", "a"], &["1_2", "b"]],
        );
        let reconciled = reconcile(&original(), &classified, &ReconcileOptions::default()).unwrap();

        assert_eq!(reconciled.rows.len(), 4);
        assert_eq!(reconciled.rows[0].last().unwrap(), "a");
        assert_eq!(reconciled.rows[1].last().unwrap(), "b");
    }

    #[test]
    fn test_reconcile_files_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.csv");
        let labels = temp_dir.path().join("flattened_results_all.csv");
        let output = temp_dir.path().join("with_labels.csv");
        std::fs::write(&input, "\u{feff}id,sentence\n1,One.\n2,Two.\n").unwrap();
        std::fs::write(&labels, "request_id,unit_id,id,label\n0,1,1_1,x\n").unwrap();

        reconcile_files(&input, &labels, &output, &ReconcileOptions::default()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "id,sentence,label_model\n1,One.,x\n2,Two.,\n"
        );
    }

    #[test]
    fn test_empty_separator_rejected() {
        let options = ReconcileOptions {
            separator: String::new(),
            ..ReconcileOptions::default()
        };
        let err = reconcile(&original(), &classified(), &options).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_key_column() {
        let options = ReconcileOptions {
            key_column: "article".to_string(),
            ..ReconcileOptions::default()
        };
        assert!(reconcile(&original(), &classified(), &options).is_err());
    }
}
