// State machine module for publication task orchestration
//
// The transition table is a pure function over (status, event); the
// orchestrator persists every transition with a versioned compare-and-set
// before it proceeds.

pub mod errors;
pub mod events;
pub mod guards;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use guards::determine_target_state;
pub use states::{StepName, TaskStatus};
pub use task_state_machine::{AdvanceOutcome, PipelineDependencies, SkipReason, TaskStateMachine};
