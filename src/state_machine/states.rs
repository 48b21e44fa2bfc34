use serde::{Deserialize, Serialize};
use std::fmt;

/// Publication task status along the fixed pipeline
///
/// The success path is strictly linear; `Failed` is the only divergence and is
/// reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, no step attempted yet
    Pending,
    /// Content enhancement claimed or waiting for a retry
    Enhancing,
    /// Enhancement finished successfully
    Enhanced,
    /// Marketplace submission claimed or waiting for a retry
    Publishing,
    /// Listing accepted by the marketplace
    Published,
    /// Final notification step finished (delivered, exhausted or skipped)
    WebhookSent,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl TaskStatus {
    /// Every status in pipeline order, `Failed` last
    pub const ALL: [TaskStatus; 8] = [
        Self::Pending,
        Self::Enhancing,
        Self::Enhanced,
        Self::Publishing,
        Self::Published,
        Self::WebhookSent,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Enhancing => "enhancing",
            Self::Enhanced => "enhanced",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::WebhookSent => "webhook_sent",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Next status on the success path, if any
    pub fn successor(&self) -> Option<TaskStatus> {
        match self {
            Self::Pending => Some(Self::Enhancing),
            Self::Enhancing => Some(Self::Enhanced),
            Self::Enhanced => Some(Self::Publishing),
            Self::Publishing => Some(Self::Published),
            Self::Published => Some(Self::WebhookSent),
            Self::WebhookSent => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Whether `target` is a legal next status from `self`
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Failed || self.successor() == Some(target)
    }

    /// The step that owns this status, i.e. the step `advance` runs next.
    /// Terminal statuses own no step.
    pub fn owning_step(&self) -> Option<StepName> {
        match self {
            Self::Pending | Self::Enhancing => Some(StepName::Enhancement),
            Self::Enhanced | Self::Publishing => Some(StepName::Publication),
            Self::Published => Some(StepName::Webhook),
            Self::WebhookSent => Some(StepName::Finalize),
            Self::Completed | Self::Failed => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid task status: {s}"))
    }
}

/// Named steps recorded in `steps_completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Enhancement,
    Publication,
    Webhook,
    Finalize,
}

impl StepName {
    pub const ALL: [StepName; 4] = [
        Self::Enhancement,
        Self::Publication,
        Self::Webhook,
        Self::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enhancement => "enhancement",
            Self::Publication => "publication",
            Self::Webhook => "webhook",
            Self::Finalize => "finalize",
        }
    }

    /// Human-readable description written to `current_step` when the step starts
    pub fn describe_start(&self) -> &'static str {
        match self {
            Self::Enhancement => "Enhancing product content with AI",
            Self::Publication => "Publishing product to marketplace",
            Self::Webhook => "Sending completion webhook",
            Self::Finalize => "Finalizing publication",
        }
    }

    /// `current_step` text once the step has finished
    pub fn describe_finish(&self) -> &'static str {
        match self {
            Self::Enhancement => "Content enhanced",
            Self::Publication => "Published to marketplace",
            Self::Webhook => "Completion webhook finished",
            Self::Finalize => "Publication completed",
        }
    }

    /// Whether this step calls an external capability and keeps a retry counter
    pub fn is_retryable_step(&self) -> bool {
        !matches!(self, Self::Finalize)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("Invalid step name: {s}"))
    }
}
