//! Grader configuration loaded from `gradeflow.toml`.
//!
//! Every field has a default, so a missing file is fine. The environment
//! variables `EVALUATOR_BASE_URL` and `EVALUATOR_API_KEY` take precedence over
//! the file; CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::evaluator::DEFAULT_BASE_URL;
use crate::invoker::RetryPolicy;

pub const CONFIG_FILE: &str = "gradeflow.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct GraderConfig {
    /// Base URL of the evaluation service.
    #[serde(default = "default_evaluator_url")]
    pub evaluator_url: String,

    /// Optional bearer token for the evaluation service.
    #[serde(default)]
    pub api_key: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory holding one state file per assignment.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_evaluator_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".gradeflow")
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            evaluator_url: default_evaluator_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            store_dir: default_store_dir(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GraderConfig {
    /// Load `gradeflow.toml` from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<GraderConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("EVALUATOR_BASE_URL").filter(|v| !v.is_empty()) {
            self.evaluator_url = url;
        }
        if let Some(key) = var("EVALUATOR_API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = GraderConfig::default();
        assert_eq!(config.evaluator_url, "http://localhost:5000");
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.store_dir, PathBuf::from(".gradeflow"));
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            evaluator_url = "https://grader.example.edu"

            [retry]
            max_attempts = 3
            jitter_ms = 0
        "#;
        let config: GraderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.evaluator_url, "https://grader.example.edu");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.jitter_ms, 0);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.store_dir, PathBuf::from(".gradeflow"));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = GraderConfig::default();
        config.apply_env(|name| match name {
            "EVALUATOR_BASE_URL" => Some("http://eval:8080".into()),
            "EVALUATOR_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.evaluator_url, "http://eval:8080");
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraderConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "retry = 5").unwrap();
        assert!(GraderConfig::load_from(&path).is_err());
    }
}
