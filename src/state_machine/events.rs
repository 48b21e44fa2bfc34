use serde::{Deserialize, Serialize};

use super::states::StepName;

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Claim the enhancement step for the first time
    StartEnhancement,
    /// Enhancement capability returned usable content
    EnhancementSucceeded,
    /// Claim the publication step for the first time
    StartPublication,
    /// Marketplace accepted the listing
    PublicationSucceeded,
    /// Final notification step finished, whatever its delivery outcome
    WebhookFinished,
    /// Close out a task whose notification step has finished
    Finalize,
    /// Unrecoverable failure in the named step
    Fail { step: StepName, message: String },
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartEnhancement => "start_enhancement",
            Self::EnhancementSucceeded => "enhancement_succeeded",
            Self::StartPublication => "start_publication",
            Self::PublicationSucceeded => "publication_succeeded",
            Self::WebhookFinished => "webhook_finished",
            Self::Finalize => "finalize",
            Self::Fail { .. } => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalize | Self::Fail { .. })
    }

    /// Create a failure event for the given step
    pub fn fail_with_error(step: StepName, message: impl Into<String>) -> Self {
        Self::Fail {
            step,
            message: message.into(),
        }
    }
}
