//! # System Constants
//!
//! Operational boundaries of the publication pipeline: the fixed step plan,
//! retry defaults, and the wire-level names shared by the webhook layer.

pub use crate::state_machine::{StepName, TaskStatus};

/// Steps counted towards progress: enhancement, publication, webhook, finalize.
pub const TOTAL_STEPS: u32 = 4;

/// Retry defaults observed for every step of the pipeline
pub mod retry {
    /// Base delay multiplied by the attempt number
    pub const BASE_DELAY_SECONDS: u64 = 60;
    /// Attempts allowed per step before the failure becomes permanent
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Upper bound applied to any computed delay
    pub const MAX_DELAY_SECONDS: u64 = 3600;
}

/// Per-call execution timeouts
pub mod timeouts {
    pub const ENHANCEMENT_SECONDS: u64 = 120;
    pub const PUBLICATION_SECONDS: u64 = 60;
    pub const WEBHOOK_SECONDS: u64 = 30;
    /// In-flight claims older than this are considered abandoned
    pub const CLAIM_LEASE_SECONDS: u64 = 300;
}

/// Webhook wire constants
pub mod webhook {
    pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
    pub const SIGNATURE_PREFIX: &str = "sha256=";
    pub const DEFAULT_USER_AGENT: &str = "MultiMarket-Hub/1.0";
    pub const RESPONSE_BODY_LIMIT: usize = 1000;
}

/// Read-side pagination bounds
pub mod query {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;
}

/// Internal lifecycle event names published on the in-process event bus
pub mod events {
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_TRANSITIONED: &str = "task.transitioned";
    pub const TASK_RETRY_SCHEDULED: &str = "task.retry_scheduled";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const NOTIFICATION_RECORDED: &str = "task.notification_recorded";
}

/// Enhancement output bounds
pub const MAX_KEYWORDS: usize = 10;
