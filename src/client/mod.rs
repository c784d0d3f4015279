//! Remote classification service
//!
//! The pipeline only sees the [`Classifier`] trait. [`OpenAiClient`] talks
//! to an OpenAI-compatible chat-completions endpoint; tests substitute
//! [`crate::testing::ScriptedClassifier`].

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod openai;
pub mod prompt;

pub use openai::OpenAiClient;
pub use prompt::PromptBuilder;

/// One request for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub request_id: usize,
    pub unit_id: String,
    pub model: String,
    pub system: String,
    pub user: String,
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierResponse {
    /// The assistant's text, expected to hold a JSON array of entries.
    pub content: String,
    pub usage: Option<TokenUsage>,
    /// Full response body as returned by the service.
    pub raw: serde_json::Value,
}

impl ClassifierResponse {
    pub fn from_content(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            raw: serde_json::json!({ "content": content }),
            content,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: ClassificationRequest) -> Result<ClassifierResponse>;
}
