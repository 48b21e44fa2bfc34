//! Configuration Loader
//!
//! Environment-aware configuration loading: YAML file discovery, environment
//! detection, environment-section merging and `${VAR}` expansion.

use super::error::{ConfigResult, ConfigurationError};
use super::PublisherConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["publisher-config.yaml", "publisher-config.yml"];
const ENVIRONMENTS: [&str; 3] = ["development", "test", "production"];
const SENSITIVE_PATTERNS: [&str; 4] = ["password", "secret", "api_key", "token"];

pub struct ConfigManager {
    config: PublisherConfig,
    environment: String,
    config_directory: PathBuf,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("environment", &self.environment)
            .field("config_directory", &self.config_directory)
            .field("config", &self.debug_config())
            .finish()
    }
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load from a directory with an explicit environment, without touching
    /// process-wide variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment,
            directory = %config_directory.display(),
            "Loading publisher configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        };

        info!(
            environment,
            max_attempts = manager.config.retry.max_attempts,
            intermediate_events = manager.config.webhook.intermediate_events,
            "Configuration loaded successfully"
        );
        debug!(config = %manager.debug_config(), "Effective configuration");

        Ok(Arc::new(manager))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: PublisherConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with sensitive fields masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null);
        sanitize_json_recursive(&mut value);
        value
    }

    /// `PUBLISHER_ENV`, then `APP_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("PUBLISHER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();
        for name in CONFIG_FILE_NAMES {
            let path = config_directory.join(name);
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(path);
            }
            searched_paths.push(path);
        }
        Err(ConfigurationError::ConfigFileNotFound { searched_paths })
    }

    fn load_and_merge_config(config_directory: &Path, environment: &str) -> ConfigResult<PublisherConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let yaml_content = std::fs::read_to_string(&config_file)
            .map_err(|source| ConfigurationError::FileReadError {
                path: config_file.clone(),
                source,
            })?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml(&config_file, e))?;

        if let Some(overrides) = yaml_data.get(environment).cloned() {
            debug!(environment, "Applying environment-specific overrides");
            merge_yaml_values(&mut yaml_data, overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for name in ENVIRONMENTS {
                map.remove(name);
            }
        }

        expand_environment_variables(&mut yaml_data)?;

        serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(&config_file, format!("does not match the configuration schema: {e}"))
        })
    }
}

/// Recursively merge environment overrides into the base document
fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
    match (&mut *base, override_value) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_ref, override_val) => *base_ref = override_val,
    }
}

/// Replace whole-string `${VAR}` values with the variable's value
fn expand_environment_variables(value: &mut YamlValue) -> ConfigResult<()> {
    match value {
        YamlValue::String(s) => {
            if let Some(name) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
                let expanded = env::var(name).map_err(|_| ConfigurationError::EnvironmentVariableError {
                    variable: name.to_string(),
                })?;
                *s = expanded;
            }
        }
        YamlValue::Mapping(map) => {
            for (_, nested) in map.iter_mut() {
                expand_environment_variables(nested)?;
            }
        }
        YamlValue::Sequence(items) => {
            for item in items.iter_mut() {
                expand_environment_variables(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn sanitize_json_recursive(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = SENSITIVE_PATTERNS
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive && !val.is_object() {
                    let masked = match &*val {
                        serde_json::Value::String(s) if s.is_empty() => "[EMPTY]".into(),
                        serde_json::Value::Null => serde_json::Value::Null,
                        _ => "[MASKED]".into(),
                    };
                    *val = masked;
                } else {
                    sanitize_json_recursive(val);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(sanitize_json_recursive),
        _ => {}
    }
}
