//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::{Config, ProviderSpec};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.fanout.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "fanout.max_concurrent must be > 0".into(),
            ));
        }
        if self.retry.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.timeout_ms must be > 0".into(),
            ));
        }
        if self.evaluation.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "evaluation.max_concurrent must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }

        let mut keys = HashSet::new();
        for spec in &self.providers {
            validate_provider(spec, "providers")?;
            if !keys.insert(spec.key()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider key \"{}\" (set a distinct label)",
                    spec.key()
                )));
            }
        }
        if let Some(judge) = &self.evaluation.judge {
            validate_provider(judge, "evaluation.judge")?;
        }

        let mut names = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "tasks[].name must not be empty".into(),
                ));
            }
            if task.template.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "tasks.{}.template must not be empty",
                    task.name
                )));
            }
            if !names.insert(task.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate task name \"{}\"",
                    task.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_provider(spec: &ProviderSpec, section: &str) -> Result<(), ConfigError> {
    if spec.name.trim().is_empty() || spec.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{section}: name and model must not be empty"
        )));
    }
    if !(0.0..=2.0).contains(&spec.temperature) {
        return Err(ConfigError::ValidationError(format!(
            "{section}.{}: temperature must be between 0.0 and 2.0",
            spec.key()
        )));
    }
    if spec.max_tokens == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{section}.{}: max_tokens must be > 0",
            spec.key()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskDefinition;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fanout.max_concurrent = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.retry.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let mut config = Config::default();
        config.providers[0].temperature = 2.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_validate_rejects_duplicate_provider_keys() {
        let mut config = Config::default();
        let mut warm = config.providers[0].clone();
        warm.temperature = 0.9;
        config.providers.push(warm.clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate provider key"));

        // A label disambiguates the same model at another temperature
        config.providers.last_mut().unwrap().label = Some("openai-warm".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_task_names() {
        let mut config = Config::default();
        config
            .tasks
            .push(TaskDefinition::new("title_enhancement", "{{ item_title }}"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate task name"));
    }

    #[test]
    fn test_validate_rejects_empty_template() {
        let mut config = Config::default();
        config.tasks[0].template = "   ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }
}
