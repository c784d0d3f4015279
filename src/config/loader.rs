use super::{ClassifierConfig, Instructions};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Loads a run file, resolves its relative paths and applies overrides.
pub struct ConfigLoader {
    path: PathBuf,
    apply_env: bool,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            apply_env: true,
        }
    }

    /// Skip `CLASSIFIER_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.apply_env = false;
        self
    }

    pub async fn load(&self) -> Result<ClassifierConfig> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut config: ClassifierConfig = toml::from_str(&content)?;

        let base_dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        resolve_paths(&mut config, &base_dir);

        if self.apply_env {
            config.merge_env_vars();
        }

        config.validate()?;
        debug!("Loaded configuration from {}", self.path.display());

        Ok(config)
    }
}

fn resolve_paths(config: &mut ClassifierConfig, base_dir: &Path) {
    let resolve = |path: &mut PathBuf| {
        if path.is_relative() {
            *path = base_dir.join(&*path);
        }
    };

    resolve(&mut config.input.path);
    resolve(&mut config.prompt.path);
    resolve(&mut config.output.root);
}

/// Reads the prompt JSON holding `SYSTEM_MESSAGE` and `TASK_INSTRUCTIONS`.
pub async fn load_instructions(path: &Path) -> Result<Instructions> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        Error::Config(format!(
            "Failed to read prompt file {}: {}",
            path.display(),
            e
        ))
    })?;

    let instructions: Instructions = serde_json::from_str(&content)?;

    Ok(Instructions {
        system_message: instructions.system_message.trim().to_string(),
        task_instructions: instructions.task_instructions.trim().to_string(),
    })
}
