//! Testing utilities
//!
//! [`ScriptedClassifier`] stands in for the remote service so the pipeline
//! can be exercised end to end without a network.

use crate::client::{ClassificationRequest, Classifier, ClassifierResponse, TokenUsage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A canned reply for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Content(String),
    Fail(String),
}

/// In-process classifier with scripted replies.
///
/// Units without a scripted reply get one `{"id", "label"}` entry per
/// sentence line found in the request.
pub struct ScriptedClassifier {
    replies: HashMap<String, ScriptedReply>,
    label: String,
    usage: Option<TokenUsage>,
    delay: Option<Duration>,
    jitter: Option<Duration>,
    calls: Mutex<Vec<ClassificationRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn labeling() -> Self {
        Self {
            replies: HashMap::new(),
            label: "positive".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            delay: None,
            jitter: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_reply(mut self, unit_id: &str, reply: ScriptedReply) -> Self {
        self.replies.insert(unit_id.to_string(), reply);
        self
    }

    pub fn failing_unit(self, unit_id: &str, message: &str) -> Self {
        self.with_reply(unit_id, ScriptedReply::Fail(message.to_string()))
    }

    pub fn without_usage(mut self) -> Self {
        self.usage = None;
        self
    }

    /// Fixed latency for every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Extra latency that varies with the request id, so completion order
    /// differs from submission order.
    pub fn with_jitter(mut self, step: Duration) -> Self {
        self.jitter = Some(step);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<ClassificationRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn requested_units(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.unit_id).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn label_sentences(&self, user: &str) -> String {
        let entries: Vec<_> = sentence_ids(user)
            .into_iter()
            .map(|id| json!({ "id": id, "label": self.label }))
            .collect();
        serde_json::Value::Array(entries).to_string()
    }
}

/// Sentence ids from lines of the form `<id>. "<text>"`.
pub fn sentence_ids(user: &str) -> Vec<String> {
    user.lines()
        .filter(|line| line.ends_with('"'))
        .filter_map(|line| line.split_once(". \""))
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty() && !id.contains(char::is_whitespace))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, request: ClassificationRequest) -> Result<ClassifierResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }

        let mut wait = self.delay.unwrap_or_default();
        if let Some(step) = self.jitter {
            wait += step * ((request.request_id * 7 % 5) as u32);
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let result = match self.replies.get(&request.unit_id) {
            Some(ScriptedReply::Fail(message)) => Err(Error::External(message.clone())),
            Some(ScriptedReply::Content(content)) => Ok(ClassifierResponse::from_content(content.clone())),
            None => Ok(ClassifierResponse::from_content(self.label_sentences(&request.user))),
        }
        .map(|response| match self.usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
