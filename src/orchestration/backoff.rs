//! Retry and backoff policy shared by all steps.
//!
//! `delay = min(base_delay * attempt, max_delay)`, with one maximum attempt
//! count for every step unless the step has an override.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::state_machine::StepName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    /// Budget spent; the failure becomes permanent
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_attempts: u32,
    max_delay: Duration,
    step_overrides: HashMap<StepName, u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_attempts,
            max_delay,
            step_overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.base_delay_seconds),
            max_attempts: config.max_attempts,
            max_delay: Duration::from_secs(config.max_delay_seconds),
            step_overrides: config.step_overrides.clone(),
        }
    }

    pub fn with_step_override(mut self, step: StepName, max_attempts: u32) -> Self {
        self.step_overrides.insert(step, max_attempts);
        self
    }

    pub fn max_attempts(&self, step: StepName) -> u32 {
        self.step_overrides
            .get(&step)
            .copied()
            .unwrap_or(self.max_attempts)
    }

    /// Delay before attempt `attempt_number + 1`, given `attempt_number`
    /// failures so far
    pub fn next_delay(&self, _step: StepName, attempt_number: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt_number.max(1))
            .min(self.max_delay)
    }

    /// Decide what to do after the step's retry counter reached `retries`
    pub fn decide(&self, step: StepName, retries: u32) -> RetryDecision {
        if retries >= self.max_attempts(step) {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry {
                delay: self.next_delay(step, retries),
            }
        }
    }
}
