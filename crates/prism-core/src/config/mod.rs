//! Configuration management for Prism.
//!
//! Configuration is loaded from `~/.config/prism/config.toml` (or a JSON file
//! with the same shape) with sensible defaults. It lists the provider
//! `(name, model, temperature)` tuples to fan out to and the task definitions
//! whose prompts get sent to every provider.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Prism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Fan-out concurrency settings
    pub fanout: FanOutConfig,

    /// Per-call retry settings
    pub retry: RetryConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Provider credentials and endpoints
    pub credentials: CredentialsConfig,

    /// Styling guide source
    pub styling: StylingConfig,

    /// LLM-as-judge settings
    pub evaluation: EvaluationConfig,

    /// Providers every task is fanned out to
    pub providers: Vec<ProviderSpec>,

    /// Enrichment and evaluation tasks
    pub tasks: Vec<TaskDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            fanout: FanOutConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            credentials: CredentialsConfig::default(),
            styling: StylingConfig::default(),
            evaluation: EvaluationConfig::default(),
            providers: default_providers(),
            tasks: default_tasks(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        tracing::debug!(
            "Loaded config from {} ({} providers, {} tasks)",
            path.display(),
            config.providers.len(),
            config.tasks.len()
        );
        Ok(config)
    }

    /// Parse and validate a TOML config string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config string.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.prism.prism/config.toml
    /// - Linux: ~/.config/prism/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\prism\config\config.toml
    ///
    /// Falls back to ~/.prism/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "prism", "prism")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".prism").join("config.toml")
            })
    }

    /// Get the resolved database path (with ~ expansion).
    pub fn database_path(&self) -> PathBuf {
        let path_str = self.general.database_path.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Get the resolved styling guide CSV path, if one is configured.
    pub fn styling_guides_path(&self) -> Option<PathBuf> {
        self.styling.guides_path.as_ref().map(|p| {
            let path_str = p.to_string_lossy();
            PathBuf::from(shellexpand::tilde(&path_str).into_owned())
        })
    }

    /// Look up a task definition by name.
    pub fn task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fanout.max_concurrent, 8);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.server.port, 8080);
        assert!(!config.providers.is_empty());
        assert!(config.task("title_enhancement").is_some());
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[[providers]]"));
        assert!(toml.contains("[[tasks]]"));
    }

    #[test]
    fn test_toml_round_trips_through_loader() {
        let toml = Config::default().to_toml().unwrap();
        let parsed = Config::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.providers.len(), Config::default().providers.len());
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.json");
        std::fs::write(
            &path,
            r#"{
                "providers": [
                    {"name": "openai", "model": "gpt-4o-mini", "temperature": 0.1},
                    {"name": "gemini", "model": "gemini-1.5-flash", "temperature": 0.7}
                ],
                "tasks": [
                    {"name": "title_enhancement", "template": "Improve: {{ item_title }}"}
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].temperature, 0.7);
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].kind, TaskKind::Enrichment);
        assert_eq!(config.tasks[0].output_format, ResponseFormat::Text);
        // Sections not present fall back to defaults
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_load_toml_config_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[fanout]
max_concurrent = 2

[[providers]]
name = "runpod"
model = "mistral-7b-instruct"
temperature = 0.3
label = "mistral"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fanout.max_concurrent, 2);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].key(), "mistral");
        // Tasks omitted entirely keep the defaults
        assert!(config.task("attribute_extraction").is_some());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fanout]\nmax_concurrent = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[test]
    fn test_database_path_expands_tilde() {
        let config = Config::default();
        let path = config.database_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("prism.db"));
    }
}
