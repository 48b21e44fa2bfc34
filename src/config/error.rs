//! Configuration loading and validation errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No publisher configuration file found (searched {searched_paths:?})")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    #[error("Cannot read {}: {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax errors and documents that do not fit [`super::PublisherConfig`]
    #[error("Invalid YAML in {}: {reason}", .path.display())]
    InvalidYaml { path: PathBuf, reason: String },

    /// A `${VAR}` placeholder names a variable that is not set
    #[error("Environment variable '{variable}' referenced by the configuration is not set")]
    EnvironmentVariableError { variable: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required setting '{field}'")]
    MissingRequiredField { field: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_yaml(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::InvalidYaml {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
