//! # Orchestration
//!
//! Execution machinery under the task state machine:
//!
//! - **Step executors**: one per external capability (enhancement,
//!   marketplace publication, webhook delivery), each reporting a tri-state
//!   [`StepOutcome`]
//! - **Retry policy**: linear backoff with a per-step attempt budget
//! - **Scheduler**: delayed work items drained by a bounded worker pool, so a
//!   task waiting on backoff never holds a worker
//! - **Clock**: wall time derived from the tokio clock

pub mod backoff;
pub mod clock;
pub mod enhancer;
pub mod notifier;
pub mod outcome;
pub mod publisher;
pub mod scheduler;
pub mod step_executor;

pub use backoff::{RetryDecision, RetryPolicy};
pub use clock::PipelineClock;
pub use enhancer::EnhancerExecutor;
pub use notifier::{DeliveryReceipt, NotifierExecutor};
pub use outcome::{StepError, StepOutcome};
pub use publisher::{PublicationContext, PublisherExecutor, UNSUPPORTED_MARKETPLACE};
pub use scheduler::{
    TokioScheduler, WorkHandler, WorkItem, WorkScheduler, WorkerPool, WorkerPoolHandle,
};
pub use step_executor::StepExecutor;
