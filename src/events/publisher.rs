use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::events;
use crate::state_machine::{StepName, TaskStatus};

/// In-process publisher for task lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<TaskLifecycleEvent>,
}

/// One persisted change to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLifecycleEvent {
    /// One of the `task.*` names in [`crate::constants::events`]
    pub name: String,
    pub task_id: Uuid,
    pub from_status: Option<TaskStatus>,
    pub to_status: TaskStatus,
    pub step: Option<StepName>,
    #[serde(default)]
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl TaskLifecycleEvent {
    pub fn new(name: &str, task_id: Uuid, from_status: Option<TaskStatus>, to_status: TaskStatus) -> Self {
        Self {
            name: name.to_string(),
            task_id,
            from_status,
            to_status,
            step: None,
            context: Value::Null,
            published_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: StepName) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Name for a status change: terminal statuses get their own event names
    pub fn transition_name(to_status: TaskStatus) -> &'static str {
        match to_status {
            TaskStatus::Completed => events::TASK_COMPLETED,
            TaskStatus::Failed => events::TASK_FAILED,
            _ => events::TASK_TRANSITIONED,
        }
    }
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: TaskLifecycleEvent) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
