use proptest::prelude::*;

use publisher_core::models::{MarketplaceRecord, PublicationTask};
use publisher_core::state_machine::{determine_target_state, StepName, TaskEvent, TaskStatus};

use crate::common::{marketplace, product};

fn any_event() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        Just(TaskEvent::StartEnhancement),
        Just(TaskEvent::EnhancementSucceeded),
        Just(TaskEvent::StartPublication),
        Just(TaskEvent::PublicationSucceeded),
        Just(TaskEvent::WebhookFinished),
        Just(TaskEvent::Finalize),
        prop::sample::select(StepName::ALL.to_vec())
            .prop_map(|step| TaskEvent::fail_with_error(step, "boom")),
    ]
}

fn fresh_task() -> PublicationTask {
    let record: MarketplaceRecord = marketplace(1, "MercadoLibre", "mercadolibre");
    PublicationTask::new(&product(1), &record)
}

proptest! {
    #[test]
    fn accepted_transitions_are_legal(events in prop::collection::vec(any_event(), 0..24)) {
        let mut status = TaskStatus::Pending;
        for event in &events {
            match determine_target_state(status, event) {
                Ok(next) => {
                    prop_assert!(status.can_transition_to(next), "{status} -> {next}");
                    status = next;
                }
                Err(_) => prop_assert!(
                    status.is_terminal() || !matches!(event, TaskEvent::Fail { .. }),
                    "failure rejected from non-terminal {status}"
                ),
            }
        }
    }

    #[test]
    fn terminal_statuses_accept_nothing(event in any_event()) {
        prop_assert!(determine_target_state(TaskStatus::Completed, &event).is_err());
        prop_assert!(determine_target_state(TaskStatus::Failed, &event).is_err());
    }

    #[test]
    fn progress_tracks_distinct_steps(steps in prop::collection::vec(prop::sample::select(StepName::ALL.to_vec()), 0..16)) {
        let mut task = fresh_task();
        let mut last = task.progress_percentage();
        for step in &steps {
            task.add_step_completed(*step);
            let progress = task.progress_percentage();
            prop_assert!(progress >= last);
            prop_assert!((0.0..=100.0).contains(&progress));
            last = progress;
        }

        let mut distinct = steps.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(task.steps_completed.len(), distinct.len());
        prop_assert_eq!(task.progress_percentage(), distinct.len() as f64 * 25.0);
    }
}
