//! Raw per-chunk result documents
//!
//! The raw document is the audit trail of a chunk: every call, successful or
//! not, exactly as it came back.

use super::types::{CallOutcome, RawResult, RawResultRecord, RequestStatus};
use crate::error::{Error, Result};
use crate::storage::write_json_atomic;
use std::path::Path;

/// A chunk's results in serializable form plus its token count.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedChunk {
    pub records: Vec<RawResultRecord>,
    pub tokens: u64,
}

impl SerializedChunk {
    /// Rebuilds the token count from records already on disk.
    pub fn from_records(records: Vec<RawResultRecord>) -> Self {
        let tokens = records
            .iter()
            .filter_map(|r| r.usage.map(|u| u.total_tokens))
            .sum();
        Self { records, tokens }
    }
}

pub fn serialize_results(results: Vec<RawResult>) -> SerializedChunk {
    let mut tokens = 0;
    let records = results
        .into_iter()
        .map(|result| match result.outcome {
            CallOutcome::Success(response) => {
                tokens += response.usage.map(|u| u.total_tokens).unwrap_or(0);
                RawResultRecord {
                    request_id: result.request_id,
                    unit_id: result.unit_id,
                    status: RequestStatus::Success,
                    payload: Some(response.content),
                    usage: response.usage,
                    response: Some(response.raw),
                    error: None,
                }
            }
            CallOutcome::Failure(error) => RawResultRecord {
                request_id: result.request_id,
                unit_id: result.unit_id,
                status: RequestStatus::Failed,
                payload: None,
                usage: None,
                response: None,
                error: Some(error),
            },
        })
        .collect();

    SerializedChunk { records, tokens }
}

pub fn write_raw_document(path: &Path, records: &[RawResultRecord]) -> Result<()> {
    write_json_atomic(path, records)
}

pub fn read_raw_document(path: &Path) -> Result<Vec<RawResultRecord>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Parse(format!("{} is not a raw result document: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClassifierResponse, TokenUsage};
    use tempfile::TempDir;

    fn results() -> Vec<RawResult> {
        vec![
            RawResult {
                request_id: 0,
                unit_id: "a".into(),
                outcome: CallOutcome::Success(
                    ClassifierResponse::from_content("[]").with_usage(TokenUsage {
                        prompt_tokens: 30,
                        completion_tokens: 12,
                        total_tokens: 42,
                    }),
                ),
            },
            RawResult {
                request_id: 1,
                unit_id: "b".into(),
                outcome: CallOutcome::Failure("timeout".into()),
            },
            RawResult {
                request_id: 2,
                unit_id: "c".into(),
                outcome: CallOutcome::Success(ClassifierResponse::from_content("[]")),
            },
        ]
    }

    #[test]
    fn test_serialize_counts_tokens() {
        let chunk = serialize_results(results());

        assert_eq!(chunk.tokens, 42);
        assert_eq!(chunk.records.len(), 3);
        assert_eq!(chunk.records[1].status, RequestStatus::Failed);
        assert_eq!(chunk.records[1].error.as_deref(), Some("timeout"));
        assert_eq!(chunk.records[2].payload.as_deref(), Some("[]"));
    }

    #[test]
    fn test_document_keeps_successes_and_failures() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch_results_1.json");
        let chunk = serialize_results(results());

        write_raw_document(&path, &chunk.records).unwrap();
        let document: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(document[0]["status"], "success");
        assert_eq!(document[0]["usage"]["total_tokens"], 42);
        assert_eq!(document[1]["status"], "failed");
        assert_eq!(document[1]["error"], "timeout");
        assert!(document[1].get("payload").is_none());

        let reread = SerializedChunk::from_records(read_raw_document(&path).unwrap());
        assert_eq!(reread, chunk);
    }

    #[test]
    fn test_read_rejects_foreign_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch_results_1.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(read_raw_document(&path), Err(Error::Parse(_))));
    }
}
