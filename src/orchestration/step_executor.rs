//! # Step Executor
//!
//! Common contract of the three external-capability steps. An executor only
//! reports what happened; retry accounting and status transitions belong to
//! the state machine.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::outcome::{StepError, StepOutcome};
use crate::state_machine::StepName;

#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Inputs assembled by the state machine before the call
    type Context: Send + Sync;
    /// Result recorded on the task on success
    type Output: Send;

    fn step(&self) -> StepName;

    /// Upper bound on one execution
    fn timeout(&self) -> Duration;

    async fn execute(&self, context: &Self::Context) -> StepOutcome<Self::Output>;
}

/// Run `operation` under `limit`; an elapsed timer is a retryable failure
pub(crate) async fn with_timeout<T, F>(step: StepName, limit: Duration, operation: F) -> StepOutcome<T>
where
    F: Future<Output = StepOutcome<T>>,
{
    match timeout(limit, operation).await {
        Ok(outcome) => outcome,
        Err(_) => StepOutcome::Retryable(StepError::timeout(step.as_str(), limit)),
    }
}
