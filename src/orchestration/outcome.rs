//! Tri-state result of one step execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Failure detail carried by retryable and permanent outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub message: String,
    pub error_code: Option<String>,
    /// Raw upstream payload, kept verbatim
    pub upstream_response: Option<Value>,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
            upstream_response: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_upstream(mut self, upstream: Value) -> Self {
        self.upstream_response = Some(upstream);
        self
    }

    pub fn timeout(operation: &str, limit: Duration) -> Self {
        Self::new(format!("{operation} timed out after {}s", limit.as_secs_f64())).with_code("TIMEOUT")
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// What a step executor reports back to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Success(T),
    /// Transient failure; the state machine decides whether to try again
    Retryable(StepError),
    /// Upstream rejection that no retry can fix
    Permanent(StepError),
}

impl<T> StepOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Retryable(_) => "retryable",
            Self::Permanent(_) => "permanent",
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match self {
            Self::Success(_) => None,
            Self::Retryable(error) | Self::Permanent(error) => Some(error),
        }
    }
}
