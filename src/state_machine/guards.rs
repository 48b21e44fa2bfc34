use super::errors::{StateMachineError, StateMachineResult};
use super::events::TaskEvent;
use super::states::TaskStatus;

/// Resolve the status an event moves a task into.
///
/// This is the complete transition table: the linear success path plus the
/// single divergence to `Failed` from any non-terminal status. Everything else
/// is rejected, so no transition can move backwards or skip a status.
pub fn determine_target_state(
    current: TaskStatus,
    event: &TaskEvent,
) -> StateMachineResult<TaskStatus> {
    let target = match (current, event) {
        (TaskStatus::Pending, TaskEvent::StartEnhancement) => TaskStatus::Enhancing,
        (TaskStatus::Enhancing, TaskEvent::EnhancementSucceeded) => TaskStatus::Enhanced,
        (TaskStatus::Enhanced, TaskEvent::StartPublication) => TaskStatus::Publishing,
        (TaskStatus::Publishing, TaskEvent::PublicationSucceeded) => TaskStatus::Published,
        (TaskStatus::Published, TaskEvent::WebhookFinished) => TaskStatus::WebhookSent,
        (TaskStatus::WebhookSent, TaskEvent::Finalize) => TaskStatus::Completed,
        (from, TaskEvent::Fail { .. }) if !from.is_terminal() => TaskStatus::Failed,
        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    debug_assert!(current.can_transition_to(target));
    Ok(target)
}
