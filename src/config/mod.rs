//! Run configuration
//!
//! A run is described by one TOML file plus a prompt JSON file. The loaded
//! and validated [`ClassifierConfig`] is passed explicitly into every
//! pipeline component; nothing here is global.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub mod loader;

pub use loader::{load_instructions, ConfigLoader};

/// Column names reserved for the identifiers every output row carries.
pub const RESERVED_COLUMNS: [&str; 2] = ["request_id", "unit_id"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub input: InputConfig,
    pub prompt: PromptConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub output: OutputConfig,
    /// Ordered remote-field → output-column table. Empty means raw JSON rows.
    #[serde(default)]
    pub mapping: Vec<FieldMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    pub group_column: String,
    pub sequence_column: String,
    pub text_column: String,
    #[serde(default)]
    pub body_column: Option<String>,
    #[serde(default)]
    pub include_body: bool,
    /// 0 disables truncation.
    #[serde(default)]
    pub body_max_chars: usize,
    #[serde(default = "default_separator")]
    pub sentence_id_separator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Key in the remote service's entry.
    pub field: String,
    /// Column name in the structured output.
    pub column: String,
}

impl FieldMapping {
    pub fn new(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            column: column.into(),
        }
    }
}

/// System and task instructions sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(rename = "SYSTEM_MESSAGE")]
    pub system_message: String,
    #[serde(rename = "TASK_INSTRUCTIONS")]
    pub task_instructions: String,
}

fn default_separator() -> String {
    "_".to_string()
}

fn default_model_name() -> String {
    "gpt-5-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_chunk_size() -> usize {
    100
}

fn default_max_workers() -> usize {
    20
}

impl InputConfig {
    /// Input settings for the three required columns, everything else default.
    pub fn columns(
        group_column: impl Into<String>,
        sequence_column: impl Into<String>,
        text_column: impl Into<String>,
    ) -> Self {
        Self {
            path: PathBuf::new(),
            group_column: group_column.into(),
            sequence_column: sequence_column.into(),
            text_column: text_column.into(),
            body_column: None,
            include_body: false,
            body_max_chars: 0,
            sentence_id_separator: default_separator(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
        }
    }
}

impl ClassifierConfig {
    pub fn merge_env_vars(&mut self) {
        self.apply_env_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `CLASSIFIER_*` overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("CLASSIFIER_MODEL") {
            self.model.name = model;
        }

        if let Some(base_url) = lookup("CLASSIFIER_BASE_URL") {
            self.model.base_url = base_url;
        }

        if let Some(workers) = lookup("CLASSIFIER_MAX_WORKERS") {
            match workers.parse::<usize>() {
                Ok(value) => self.batch.max_workers = value,
                Err(_) => tracing::warn!("Ignoring non-numeric CLASSIFIER_MAX_WORKERS={}", workers),
            }
        }

        if let Some(chunk_size) = lookup("CLASSIFIER_CHUNK_SIZE") {
            match chunk_size.parse::<usize>() {
                Ok(value) => self.batch.chunk_size = value,
                Err(_) => tracing::warn!("Ignoring non-numeric CLASSIFIER_CHUNK_SIZE={}", chunk_size),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.chunk_size == 0 {
            return Err(Error::Config("batch.chunk_size must be greater than 0".into()));
        }
        if self.batch.max_workers == 0 {
            return Err(Error::Config("batch.max_workers must be greater than 0".into()));
        }

        let columns = [
            ("input.group_column", &self.input.group_column),
            ("input.sequence_column", &self.input.sequence_column),
            ("input.text_column", &self.input.text_column),
        ];
        for (name, value) in columns {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }

        if self.model.name.trim().is_empty() {
            return Err(Error::Config("model.name must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for mapping in &self.mapping {
            if mapping.field.is_empty() || mapping.column.is_empty() {
                return Err(Error::Config(
                    "mapping entries need both a field and a column".into(),
                ));
            }
            if RESERVED_COLUMNS.contains(&mapping.column.as_str()) {
                return Err(Error::Config(format!(
                    "mapping column '{}' collides with a reserved column",
                    mapping.column
                )));
            }
            if !seen.insert(mapping.column.as_str()) {
                return Err(Error::Config(format!(
                    "mapping column '{}' is declared more than once",
                    mapping.column
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ClassifierConfig {
        ClassifierConfig {
            input: InputConfig::columns("id", "id", "sentence"),
            prompt: PromptConfig {
                path: PathBuf::from("prompt.json"),
            },
            model: ModelConfig::default(),
            batch: BatchConfig::default(),
            output: OutputConfig {
                root: PathBuf::from("out"),
            },
            mapping: vec![
                FieldMapping::new("id", "id"),
                FieldMapping::new("pressure", "pressure"),
            ],
        }
    }

    #[test]
    fn test_defaults_match_original_tuning() {
        let batch = BatchConfig::default();
        assert_eq!(batch.chunk_size, 100);
        assert_eq!(batch.max_workers, 20);
        assert_eq!(ModelConfig::default().timeout_secs, 120);
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = sample_config();
        config.batch.chunk_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = sample_config();
        config.batch.max_workers = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_reserved_and_duplicate_columns() {
        let mut config = sample_config();
        config.mapping.push(FieldMapping::new("x", "unit_id"));
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.mapping.push(FieldMapping::new("other", "pressure"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = sample_config();
        config.apply_env_overrides(|name| match name {
            "CLASSIFIER_MODEL" => Some("gpt-4o".to_string()),
            "CLASSIFIER_MAX_WORKERS" => Some("3".to_string()),
            "CLASSIFIER_CHUNK_SIZE" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.batch.max_workers, 3);
        assert_eq!(config.batch.chunk_size, 100);
    }
}
