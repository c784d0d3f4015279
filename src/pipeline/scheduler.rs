//! Chunk planning and skip decisions
//!
//! Chunks are contiguous, 1-indexed slices of the unit list. Whether a chunk
//! needs work is decided by the presence of its artifacts on disk, not by
//! the numeric checkpoint.

use crate::error::{Error, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const RAW_PREFIX: &str = "batch_results_";
pub const STRUCTURED_PREFIX: &str = "flattened_results_";
pub const FAILED_PREFIX: &str = "failed_results_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position of the chunk in the run.
    pub index: usize,
    /// Positions of the chunk's units in the full unit list.
    pub range: Range<usize>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Splits `total_units` positions into chunks of `chunk_size`; only the
/// last chunk may be shorter.
pub fn plan_chunks(total_units: usize, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::Validation("chunk size must be greater than 0".into()));
    }

    Ok((0..total_units)
        .step_by(chunk_size)
        .enumerate()
        .map(|(i, start)| Chunk {
            index: i + 1,
            range: start..(start + chunk_size).min(total_units),
        })
        .collect())
}

/// File locations owned by one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArtifacts {
    pub raw: PathBuf,
    pub structured: PathBuf,
    pub failures: PathBuf,
}

impl ChunkArtifacts {
    pub fn for_chunk(run_dir: &Path, index: usize) -> Self {
        Self {
            raw: run_dir.join(format!("{RAW_PREFIX}{index}.json")),
            structured: run_dir.join(format!("{STRUCTURED_PREFIX}{index}.csv")),
            failures: run_dir.join(format!("{FAILED_PREFIX}{index}.csv")),
        }
    }

    /// Both the raw and the structured document exist.
    pub fn is_complete(&self) -> bool {
        self.raw.is_file() && self.structured.is_file()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDecision {
    /// Both documents exist; nothing to do.
    Skip,
    /// Only the raw document exists; rebuild the rest from it without
    /// calling the service again.
    Reflatten,
    Dispatch,
}

pub fn decide(artifacts: &ChunkArtifacts) -> ChunkDecision {
    if artifacts.is_complete() {
        ChunkDecision::Skip
    } else if artifacts.raw.is_file() {
        ChunkDecision::Reflatten
    } else {
        ChunkDecision::Dispatch
    }
}

/// Chunk index encoded in a per-chunk file name such as
/// `flattened_results_3.csv`.
pub fn chunk_index_from_name(name: &str, prefix: &str, extension: &str) -> Option<usize> {
    name.strip_prefix(prefix)?
        .strip_suffix(extension)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_chunks_last_shorter() {
        let chunks = plan_chunks(5, 2).unwrap();
        assert_eq!(
            chunks,
            vec![
                Chunk { index: 1, range: 0..2 },
                Chunk { index: 2, range: 2..4 },
                Chunk { index: 3, range: 4..5 },
            ]
        );
    }

    #[test]
    fn test_plan_chunks_edge_cases() {
        assert!(plan_chunks(0, 3).unwrap().is_empty());
        assert_eq!(plan_chunks(3, 10).unwrap().len(), 1);
        assert!(plan_chunks(3, 0).is_err());
    }

    #[test]
    fn test_artifact_names() {
        let artifacts = ChunkArtifacts::for_chunk(Path::new("/runs/r1"), 4);
        assert_eq!(artifacts.raw, Path::new("/runs/r1/batch_results_4.json"));
        assert_eq!(artifacts.structured, Path::new("/runs/r1/flattened_results_4.csv"));
        assert_eq!(artifacts.failures, Path::new("/runs/r1/failed_results_4.csv"));
    }

    #[test]
    fn test_decide_from_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let artifacts = ChunkArtifacts::for_chunk(temp_dir.path(), 1);
        assert_eq!(decide(&artifacts), ChunkDecision::Dispatch);

        std::fs::write(&artifacts.structured, "request_id,unit_id\n").unwrap();
        assert_eq!(decide(&artifacts), ChunkDecision::Dispatch);

        std::fs::remove_file(&artifacts.structured).unwrap();
        std::fs::write(&artifacts.raw, "[]").unwrap();
        assert_eq!(decide(&artifacts), ChunkDecision::Reflatten);

        std::fs::write(&artifacts.structured, "request_id,unit_id\n").unwrap();
        assert_eq!(decide(&artifacts), ChunkDecision::Skip);
    }

    #[test]
    fn test_chunk_index_from_name() {
        assert_eq!(
            chunk_index_from_name("flattened_results_12.csv", STRUCTURED_PREFIX, "csv"),
            Some(12)
        );
        assert_eq!(
            chunk_index_from_name("flattened_results_all.csv", STRUCTURED_PREFIX, "csv"),
            None
        );
        assert_eq!(
            chunk_index_from_name("failed_results_2.csv", STRUCTURED_PREFIX, "csv"),
            None
        );
    }
}
