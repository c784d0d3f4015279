//! Data carried between pipeline stages

use crate::client::{ClassifierResponse, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sentence inside a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub sentence_id: String,
    pub text: String,
}

/// The records sharing one group key; one remote call each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: String,
    pub sentences: Vec<Sentence>,
    pub body: String,
}

/// Outcome of one call as the dispatcher saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success(ClassifierResponse),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub request_id: usize,
    pub unit_id: String,
    pub outcome: CallOutcome,
}

impl RawResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Success,
    Failed,
}

/// Serializable form of a [`RawResult`], one element of the per-chunk raw
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResultRecord {
    pub request_id: usize,
    pub unit_id: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One structured output row. `values` lines up with the owning table's
/// mapped columns; `None` marks an absent field.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRow {
    pub request_id: usize,
    pub unit_id: String,
    pub values: Vec<Option<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub request_id: usize,
    pub unit_id: String,
    pub error: String,
}
