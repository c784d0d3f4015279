//! Concatenates per-chunk documents into one table
//!
//! Merging only reads chunk documents and can be repeated at any time. It
//! does not check that every chunk of a run is present.

use super::scheduler::{chunk_index_from_name, FAILED_PREFIX, STRUCTURED_PREFIX};
use crate::error::Result;
use crate::storage::AtomicCsvWriter;
use crate::table::InputTable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MERGED_STRUCTURED: &str = "flattened_results_all.csv";
pub const MERGED_FAILED: &str = "failed_results_all.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub documents: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub structured: Option<MergeOutcome>,
    pub failures: Option<MergeOutcome>,
}

/// Per-chunk CSV documents with the given prefix, in chunk order.
pub fn discover_documents(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut found: Vec<(usize, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(index) = chunk_index_from_name(name, prefix, "csv") {
            found.push((index, entry.path()));
        }
    }

    found.sort_by_key(|(index, _)| *index);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Concatenates `documents` into `output`.
///
/// The merged header is the union of all document headers in first-seen
/// order; a document lacking a column contributes empty cells for it.
/// Returns `None` without writing anything when there are no documents.
pub fn merge_documents(documents: &[PathBuf], output: &Path) -> Result<Option<MergeOutcome>> {
    if documents.is_empty() {
        return Ok(None);
    }

    let tables = documents
        .iter()
        .map(|path| InputTable::from_path(path))
        .collect::<Result<Vec<_>>>()?;

    let mut header: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for table in &tables {
        for column in table.headers() {
            if !positions.contains_key(column) {
                positions.insert(column.to_string(), header.len());
                header.push(column.to_string());
            }
        }
    }

    let mut writer = AtomicCsvWriter::new(output)?;
    writer.write_record(&header)?;

    let mut rows = 0;
    for table in &tables {
        let targets: Vec<usize> = table.headers().iter().map(|c| positions[c]).collect();
        for record in table.records() {
            let mut cells = vec![""; header.len()];
            for (value, &target) in record.iter().zip(&targets) {
                cells[target] = value;
            }
            writer.write_record(&cells)?;
            rows += 1;
        }
    }

    let path = writer.finish()?;
    Ok(Some(MergeOutcome {
        path,
        documents: documents.len(),
        rows,
    }))
}

/// Merges a run folder's structured and failure documents into
/// `output_dir`.
pub fn merge_run(run_dir: &Path, output_dir: &Path) -> Result<MergeReport> {
    let structured_docs = discover_documents(run_dir, STRUCTURED_PREFIX)?;
    let structured = merge_documents(&structured_docs, &output_dir.join(MERGED_STRUCTURED))?;

    match &structured {
        Some(outcome) => info!(
            "Final merged CSV saved at: {} ({} rows from {} chunks)",
            outcome.path.display(),
            outcome.rows,
            outcome.documents
        ),
        None => warn!("No partial CSV files found to merge in {}", run_dir.display()),
    }

    let failure_docs = discover_documents(run_dir, FAILED_PREFIX)?;
    let failures = merge_documents(&failure_docs, &output_dir.join(MERGED_FAILED))?;
    if let Some(outcome) = &failures {
        info!(
            "Merged {} failure rows into {}",
            outcome.rows,
            outcome.path.display()
        );
    }

    Ok(MergeReport {
        structured,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discover_orders_by_chunk_index() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "flattened_results_10.csv", "a\n");
        write(temp_dir.path(), "flattened_results_2.csv", "a\n");
        write(temp_dir.path(), "flattened_results_all.csv", "a\n");
        write(temp_dir.path(), "failed_results_1.csv", "a\n");
        write(temp_dir.path(), "batch_results_1.json", "[]");

        let docs = discover_documents(temp_dir.path(), STRUCTURED_PREFIX).unwrap();
        let names: Vec<_> = docs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["flattened_results_2.csv", "flattened_results_10.csv"]);
    }

    #[test]
    fn test_merge_run_concatenates() {
        let temp_dir = TempDir::new().unwrap();
        let run = temp_dir.path();
        write(run, "flattened_results_1.csv", "request_id,unit_id,label\n0,a,x\n1,b,y\n");
        write(run, "flattened_results_2.csv", "request_id,unit_id,label\n2,c,z\n");
        write(run, "failed_results_2.csv", "request_id,unit_id,error\n3,d,timeout\n");

        let report = merge_run(run, run).unwrap();

        let structured = report.structured.unwrap();
        assert_eq!(structured.rows, 3);
        assert_eq!(structured.documents, 2);
        assert_eq!(
            std::fs::read_to_string(run.join(MERGED_STRUCTURED)).unwrap(),
            "request_id,unit_id,label\n0,a,x\n1,b,y\n2,c,z\n"
        );
        assert_eq!(report.failures.unwrap().rows, 1);

        // Running again must not pick up its own output.
        let again = merge_run(run, run).unwrap();
        assert_eq!(again.structured.unwrap().rows, 3);
    }

    #[test]
    fn test_merge_aligns_differing_headers() {
        let temp_dir = TempDir::new().unwrap();
        let first = write(temp_dir.path(), "one.csv", "request_id,unit_id,label\n0,a,x\n");
        let second = write(temp_dir.path(), "two.csv", "request_id,unit_id,score,label\n1,b,5,y\n");
        let output = temp_dir.path().join("merged.csv");

        merge_documents(&[first, second], &output).unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "request_id,unit_id,label,score\n0,a,x,\n1,b,y,5\n"
        );
    }

    #[test]
    fn test_merge_nothing_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let report = merge_run(temp_dir.path(), temp_dir.path()).unwrap();
        assert_eq!(report, MergeReport::default());
        assert!(!temp_dir.path().join(MERGED_STRUCTURED).exists());
    }
}
