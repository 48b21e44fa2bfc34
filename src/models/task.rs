//! # Publication Task Model
//!
//! The per-(product, marketplace) unit of orchestrated work.
//!
//! ## Overview
//!
//! A `PublicationTask` is created by a publish request and then mutated only by
//! the task state machine. It records weak references to the product and the
//! marketplace (identifiers plus denormalized display fields for the read
//! side), the current status, per-step retry counters and result records, and
//! the structured failure details when the task fails.
//!
//! ## Concurrency Fields
//!
//! - `version`: bumped by the store on every successful compare-and-set
//! - `active_attempt`: the step execution currently in flight, if any
//! - `next_attempt_at`: earliest time a scheduled retry may run
//!
//! ## Database Schema
//!
//! Maps to the `publication_tasks` table (see `migrations/`), with the result
//! records and `steps_completed` stored as JSONB.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{MarketplaceRecord, ProductSnapshot};
use super::results::{EnhancementResult, ErrorDetails, PublicationResult, WebhookResult};
use crate::constants::TOTAL_STEPS;
use crate::state_machine::{StepName, TaskStatus};

/// Step execution currently in flight for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepClaim {
    pub step: StepName,
    /// 1-based attempt number for this step
    pub attempt: u32,
    pub claimed_at: DateTime<Utc>,
}

impl StepClaim {
    /// Whether the claim has outlived its lease and may be taken over
    pub fn is_stale(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        now - self.claimed_at >= lease
    }
}

/// A long-running publication of one product to one marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationTask {
    pub task_id: Uuid,
    pub product_id: i64,
    pub marketplace_id: i64,
    pub product_title: String,
    pub product_sku: String,
    pub marketplace_name: String,
    pub status: TaskStatus,
    pub current_step: String,
    pub steps_completed: Vec<StepName>,
    pub total_steps: u32,
    pub enhancement_retries: u32,
    pub publication_retries: u32,
    pub webhook_retries: u32,
    pub enhancement_result: Option<EnhancementResult>,
    pub publication_result: Option<PublicationResult>,
    pub webhook_result: Option<WebhookResult>,
    pub error_details: Option<ErrorDetails>,
    pub active_attempt: Option<StepClaim>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl PublicationTask {
    /// Build a fresh `pending` task for the given product and marketplace
    pub fn new(product: &ProductSnapshot, marketplace: &MarketplaceRecord) -> Self {
        Self {
            task_id: Uuid::now_v7(),
            product_id: product.id,
            marketplace_id: marketplace.id,
            product_title: product.title.clone(),
            product_sku: product.sku.clone(),
            marketplace_name: marketplace.name.clone(),
            status: TaskStatus::Pending,
            current_step: "Queued for publication".to_string(),
            steps_completed: Vec::new(),
            total_steps: TOTAL_STEPS,
            enhancement_retries: 0,
            publication_retries: 0,
            webhook_retries: 0,
            enhancement_result: None,
            publication_result: None,
            webhook_result: None,
            error_details: None,
            active_attempt: None,
            next_attempt_at: None,
            started_at: Utc::now(),
            completed_at: None,
            version: 0,
        }
    }

    /// `count(steps_completed) / total_steps * 100`, rounded to one decimal
    pub fn progress_percentage(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let raw = self.steps_completed.len() as f64 / self.total_steps as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a finished step. Returns `false` when it was already recorded.
    pub fn add_step_completed(&mut self, step: StepName) -> bool {
        if self.steps_completed.contains(&step) {
            return false;
        }
        self.steps_completed.push(step);
        true
    }

    pub fn has_completed(&self, step: StepName) -> bool {
        self.steps_completed.contains(&step)
    }

    /// Retry counter for a step; `finalize` has none
    pub fn retries(&self, step: StepName) -> u32 {
        match step {
            StepName::Enhancement => self.enhancement_retries,
            StepName::Publication => self.publication_retries,
            StepName::Webhook => self.webhook_retries,
            StepName::Finalize => 0,
        }
    }

    /// Increment and return the retry counter for a step
    pub fn increment_retries(&mut self, step: StepName) -> u32 {
        let counter = match step {
            StepName::Enhancement => &mut self.enhancement_retries,
            StepName::Publication => &mut self.publication_retries,
            StepName::Webhook => &mut self.webhook_retries,
            StepName::Finalize => return 0,
        };
        *counter += 1;
        *counter
    }

    /// Whether a scheduled retry is still waiting for its backoff to elapse
    pub fn is_backing_off(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_some_and(|at| at > now)
    }

    /// Duration since creation, up to completion for terminal tasks
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.completed_at.unwrap_or(now) - self.started_at
    }
}
