//! # Task State Machine
//!
//! Drives one publication task from `pending` to a terminal status.
//!
//! ## Execution Model
//!
//! Every call to [`TaskStateMachine::advance`] runs at most one step:
//!
//! 1. Load the task and skip it when it is terminal, has a live in-flight
//!    claim, or is still waiting on a retry backoff
//! 2. Claim the step with a versioned compare-and-set, moving the status into
//!    its in-progress value where the step has one (`enhancing`,
//!    `publishing`). The claim is durable before any external call begins.
//! 3. Execute the step and persist its outcome against the claimed version
//! 4. Schedule the follow-up as a new unit of work: the next step, a delayed
//!    retry, or the final failure notification
//!
//! A racing `advance` (a duplicate work item, a retry firing late) loses the
//! compare-and-set and becomes a no-op, so no step runs twice concurrently for
//! the same task.
//!
//! ## Failure Handling
//!
//! Retryable outcomes increment the step's counter and re-queue the step after
//! the backoff delay. When the counter reaches the step's attempt budget the
//! outcome becomes permanent. A permanent enhancement or publication failure
//! fails the task, records `error_details`, and schedules one failure
//! notification that retries on its own without reopening the task. Webhook
//! delivery problems never change a task's outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::TaskEvent;
use super::guards::determine_target_state;
use super::states::{StepName, TaskStatus};
use crate::catalog::CatalogDirectory;
use crate::config::PublisherConfig;
use crate::constants::events as event_names;
use crate::database::{StoreError, TaskStore};
use crate::enhancement::ContentEnhancer;
use crate::error::{PublisherError, Result};
use crate::events::{EventPublisher, TaskLifecycleEvent};
use crate::logging::{log_error, log_step_operation, log_task_operation, log_webhook_operation};
use crate::marketplaces::{MarketplaceRegistry, NormalizedProduct};
use crate::models::{
    EnhancementResult, ErrorDetails, ProductSnapshot, PublicationResult, PublicationTask,
    StepClaim, WebhookResult,
};
use crate::orchestration::{
    DeliveryReceipt, EnhancerExecutor, NotifierExecutor, PipelineClock, PublicationContext,
    PublisherExecutor, RetryDecision, RetryPolicy, StepError, StepExecutor, StepOutcome,
    WorkHandler, WorkItem, WorkScheduler,
};
use crate::webhooks::{WebhookDispatcher, WebhookEventType, WebhookNotification, WebhookTransport};

const CATALOG_UNAVAILABLE: &str = "CATALOG_UNAVAILABLE";
const PRODUCT_NOT_FOUND: &str = "PRODUCT_NOT_FOUND";
const MARKETPLACE_NOT_FOUND: &str = "MARKETPLACE_NOT_FOUND";

/// Collaborators the state machine is wired with
#[derive(Clone)]
pub struct PipelineDependencies {
    pub store: Arc<dyn TaskStore>,
    pub catalog: Arc<dyn CatalogDirectory>,
    pub content_enhancer: Arc<dyn ContentEnhancer>,
    pub marketplaces: Arc<MarketplaceRegistry>,
    pub webhook_transport: Arc<dyn WebhookTransport>,
    pub scheduler: Arc<dyn WorkScheduler>,
    pub events: EventPublisher,
}

/// Why an `advance` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Terminal,
    /// Another execution holds a live claim on the task
    InFlight,
    /// A scheduled retry has not come due yet
    BackingOff,
    /// The work item was issued for a status the task has already left
    StatusMismatch,
    /// Another worker changed the task between load and compare-and-set
    LostRace,
    /// The failure notification has already been recorded
    AlreadyNotified,
}

/// What one `advance` (or failure notification attempt) did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Skipped(SkipReason),
    Advanced { from: TaskStatus, to: TaskStatus },
    RetryScheduled {
        step: StepName,
        retries: u32,
        delay: Duration,
    },
    Failed { step: StepName },
    NotificationRecorded { delivered: bool },
}

/// Orchestrator for publication tasks
pub struct TaskStateMachine {
    store: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogDirectory>,
    scheduler: Arc<dyn WorkScheduler>,
    events: EventPublisher,
    enhancer: EnhancerExecutor,
    publisher: PublisherExecutor,
    notifier: NotifierExecutor,
    retry_policy: RetryPolicy,
    clock: PipelineClock,
    claim_lease: chrono::Duration,
}

impl std::fmt::Debug for TaskStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStateMachine")
            .field("retry_policy", &self.retry_policy)
            .field("claim_lease", &self.claim_lease)
            .field("marketplaces", &self.publisher.registry().slugs())
            .finish()
    }
}

async fn execute_with<E: StepExecutor>(
    executor: &E,
    context: StepOutcome<E::Context>,
) -> StepOutcome<E::Output> {
    match context {
        StepOutcome::Success(context) => executor.execute(&context).await,
        StepOutcome::Retryable(error) => StepOutcome::Retryable(error),
        StepOutcome::Permanent(error) => StepOutcome::Permanent(error),
    }
}

/// Final notification event for a failed task
fn failure_event(step: Option<StepName>) -> WebhookEventType {
    match step {
        Some(StepName::Enhancement) => WebhookEventType::ProductEnhancementFailed,
        Some(StepName::Publication) => WebhookEventType::ProductPublishFailed,
        _ => WebhookEventType::WorkflowError,
    }
}

enum NotificationAttempt {
    Finished(WebhookResult),
    Retry {
        retries: u32,
        delay: Duration,
        error: StepError,
    },
}

fn failed_webhook_result(
    event: WebhookEventType,
    url: Option<String>,
    error: &StepError,
    attempts: u32,
    finished_at: DateTime<Utc>,
) -> WebhookResult {
    let upstream = error.upstream_response.as_ref();
    WebhookResult {
        success: false,
        event,
        url,
        status_code: upstream
            .and_then(|u| u.get("status_code"))
            .and_then(|code| code.as_u64())
            .and_then(|code| u16::try_from(code).ok()),
        response_body: upstream
            .and_then(|u| u.get("body"))
            .and_then(|body| body.as_str())
            .map(str::to_string),
        attempts,
        skipped: false,
        error: Some(error.message.clone()),
        finished_at,
    }
}

fn delivered_webhook_result(
    event: WebhookEventType,
    receipt: DeliveryReceipt,
    attempts: u32,
    finished_at: DateTime<Utc>,
) -> WebhookResult {
    WebhookResult {
        success: true,
        event,
        url: receipt.url,
        status_code: receipt.status_code,
        response_body: receipt.response_body,
        attempts,
        skipped: receipt.skipped,
        error: None,
        finished_at,
    }
}

impl TaskStateMachine {
    pub fn new(deps: PipelineDependencies, config: &PublisherConfig) -> Self {
        let execution = &config.execution;
        let dispatcher = WebhookDispatcher::new(
            deps.webhook_transport,
            &config.webhook,
            execution.webhook_timeout(),
        );

        Self {
            store: deps.store,
            catalog: deps.catalog,
            scheduler: deps.scheduler,
            events: deps.events,
            enhancer: EnhancerExecutor::new(
                deps.content_enhancer,
                config.enhancer.max_keywords,
                execution.enhancement_timeout(),
            ),
            publisher: PublisherExecutor::new(deps.marketplaces, execution.publication_timeout()),
            notifier: NotifierExecutor::new(dispatcher, execution.webhook_timeout()),
            retry_policy: RetryPolicy::from_config(&config.retry),
            clock: PipelineClock::new(),
            claim_lease: execution.claim_lease(),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn clock(&self) -> PipelineClock {
        self.clock
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Persist a new `pending` task and schedule its first step
    pub async fn create(&self, product_id: i64, marketplace_id: i64) -> Result<PublicationTask> {
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(PublisherError::ProductNotFound(product_id))?;
        let marketplace = self
            .catalog
            .find_marketplace(marketplace_id)
            .await?
            .ok_or(PublisherError::MarketplaceNotFound(marketplace_id))?;

        if !marketplace.is_active {
            return Err(PublisherError::UnsupportedMarketplace(marketplace.slug));
        }

        let mut task = PublicationTask::new(&product, &marketplace);
        task.started_at = self.clock.now();

        let stored = self.store.insert(&task).await?;

        log_task_operation(
            "create",
            stored.task_id,
            Some(product_id),
            Some(marketplace_id),
            stored.status.as_str(),
            Some(&marketplace.slug),
        );
        self.events.publish(TaskLifecycleEvent::new(
            event_names::TASK_CREATED,
            stored.task_id,
            None,
            stored.status,
        ));
        self.scheduler.schedule(
            WorkItem::Advance {
                task_id: stored.task_id,
                expected: TaskStatus::Pending,
            },
            Duration::ZERO,
        );

        Ok(stored)
    }

    /// Current persisted state of a task
    pub async fn task(&self, task_id: Uuid) -> Result<PublicationTask> {
        self.store
            .get(task_id)
            .await?
            .ok_or(PublisherError::TaskNotFound(task_id))
    }

    /// Run the next step for the task's current status
    pub async fn advance(&self, task_id: Uuid) -> Result<AdvanceOutcome> {
        let task = self.task(task_id).await?;
        self.advance_task(task).await
    }

    /// Like [`advance`](Self::advance), but only while the task is still in
    /// `expected` status
    pub async fn advance_from(&self, task_id: Uuid, expected: TaskStatus) -> Result<AdvanceOutcome> {
        let task = self.task(task_id).await?;
        if task.status != expected {
            debug!(
                task_id = %task_id,
                expected = %expected,
                actual = %task.status,
                "Task already left the scheduled status"
            );
            return Ok(AdvanceOutcome::Skipped(SkipReason::StatusMismatch));
        }
        self.advance_task(task).await
    }

    /// Re-issue `advance` for tasks found mid-flight after a restart. Claims
    /// still inside their lease are skipped and picked up once they go stale.
    pub async fn resume<I>(&self, task_ids: I) -> Vec<(Uuid, Result<AdvanceOutcome>)>
    where
        I: IntoIterator<Item = Uuid>,
    {
        join_all(task_ids.into_iter().map(|task_id| async move {
            let outcome = match self.task(task_id).await {
                Ok(task) if task.status == TaskStatus::Failed => {
                    self.deliver_failure_notification(task_id).await
                }
                Ok(task) => self.advance_task(task).await,
                Err(e) => Err(e),
            };
            (task_id, outcome)
        }))
        .await
    }

    /// Route a scheduled work item
    pub async fn dispatch(&self, item: WorkItem) -> Result<AdvanceOutcome> {
        match item {
            WorkItem::Advance { task_id, expected } => self.advance_from(task_id, expected).await,
            WorkItem::FailureNotification { task_id } => {
                self.deliver_failure_notification(task_id).await
            }
        }
    }

    /// Gate shared by step execution and failure notification
    fn blocked(&self, task: &PublicationTask, now: DateTime<Utc>) -> Option<SkipReason> {
        if let Some(claim) = &task.active_attempt {
            if !claim.is_stale(now, self.claim_lease) {
                return Some(SkipReason::InFlight);
            }
            warn!(
                task_id = %task.task_id,
                step = %claim.step,
                attempt = claim.attempt,
                claimed_at = %claim.claimed_at,
                "Taking over abandoned step claim"
            );
        }
        if task.is_backing_off(now) {
            return Some(SkipReason::BackingOff);
        }
        None
    }

    async fn advance_task(&self, task: PublicationTask) -> Result<AdvanceOutcome> {
        if task.is_terminal() {
            return Ok(AdvanceOutcome::Skipped(SkipReason::Terminal));
        }
        let now = self.clock.now();
        if let Some(reason) = self.blocked(&task, now) {
            debug!(task_id = %task.task_id, ?reason, "Advance skipped");
            return Ok(AdvanceOutcome::Skipped(reason));
        }
        let Some(step) = task.status.owning_step() else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::Terminal));
        };

        if step == StepName::Finalize {
            return self.finalize(task, now).await;
        }

        let Some(claimed) = self.claim(task, step, now).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        match step {
            StepName::Enhancement => {
                let context = self.enhancement_context(&claimed).await;
                let outcome = execute_with(&self.enhancer, context).await;
                self.apply_step_outcome(claimed, step, outcome, |task, mut result: EnhancementResult, now| {
                    result.completed_at = now;
                    task.enhancement_result = Some(result);
                })
                .await
            }
            StepName::Publication => {
                let context = self.publication_context(&claimed).await;
                let outcome = execute_with(&self.publisher, context).await;
                self.apply_step_outcome(claimed, step, outcome, |task, mut result: PublicationResult, now| {
                    result.completed_at = now;
                    task.publication_result = Some(result);
                })
                .await
            }
            StepName::Webhook => self.run_completion_webhook(claimed).await,
            StepName::Finalize => Ok(AdvanceOutcome::Skipped(SkipReason::StatusMismatch)),
        }
    }

    /// Persist `next` if the stored version is still `expected_version`.
    /// `None` means another worker got there first.
    async fn persist(
        &self,
        expected_version: u64,
        next: &PublicationTask,
    ) -> Result<Option<PublicationTask>> {
        match self.store.compare_and_swap(expected_version, next).await {
            Ok(stored) => Ok(Some(stored)),
            Err(StoreError::VersionConflict {
                task_id,
                expected,
                actual,
            }) => {
                debug!(task_id = %task_id, expected, actual, "Lost compare-and-set race");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn publish_transition(&self, task: &PublicationTask, from: TaskStatus, step: StepName) {
        if from == task.status {
            return;
        }
        self.events.publish(
            TaskLifecycleEvent::new(
                TaskLifecycleEvent::transition_name(task.status),
                task.task_id,
                Some(from),
                task.status,
            )
            .with_step(step)
            .with_context(json!({ "progress_percentage": task.progress_percentage() })),
        );
    }

    /// Record the in-flight execution before any external call
    async fn claim(
        &self,
        task: PublicationTask,
        step: StepName,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicationTask>> {
        let from = task.status;
        let start = match (step, from) {
            (StepName::Enhancement, TaskStatus::Pending) => Some(TaskEvent::StartEnhancement),
            (StepName::Publication, TaskStatus::Enhanced) => Some(TaskEvent::StartPublication),
            _ => None,
        };

        let mut next = task.clone();
        if let Some(event) = start {
            next.status = determine_target_state(from, &event)?;
        }
        let attempt = task.retries(step) + 1;
        if !task.is_terminal() {
            next.current_step = step.describe_start().to_string();
        }
        next.active_attempt = Some(StepClaim {
            step,
            attempt,
            claimed_at: now,
        });
        next.next_attempt_at = None;

        let Some(stored) = self.persist(task.version, &next).await? else {
            return Ok(None);
        };

        log_step_operation("claim", stored.task_id, step.as_str(), attempt, stored.status.as_str(), None);
        self.publish_transition(&stored, from, step);
        Ok(Some(stored))
    }

    async fn load_product(&self, task: &PublicationTask) -> StepOutcome<ProductSnapshot> {
        match self.catalog.find_product(task.product_id).await {
            Ok(Some(product)) => StepOutcome::Success(product),
            Ok(None) => StepOutcome::Permanent(
                StepError::new(format!("Product not found: {}", task.product_id))
                    .with_code(PRODUCT_NOT_FOUND),
            ),
            Err(e) => StepOutcome::Retryable(StepError::new(e.to_string()).with_code(CATALOG_UNAVAILABLE)),
        }
    }

    async fn enhancement_context(&self, task: &PublicationTask) -> StepOutcome<ProductSnapshot> {
        self.load_product(task).await
    }

    async fn publication_context(&self, task: &PublicationTask) -> StepOutcome<PublicationContext> {
        let product = match self.load_product(task).await {
            StepOutcome::Success(product) => product,
            StepOutcome::Retryable(e) => return StepOutcome::Retryable(e),
            StepOutcome::Permanent(e) => return StepOutcome::Permanent(e),
        };
        let marketplace = match self.catalog.find_marketplace(task.marketplace_id).await {
            Ok(Some(marketplace)) => marketplace,
            Ok(None) => {
                return StepOutcome::Permanent(
                    StepError::new(format!("Marketplace not found: {}", task.marketplace_id))
                        .with_code(MARKETPLACE_NOT_FOUND),
                )
            }
            Err(e) => {
                return StepOutcome::Retryable(StepError::new(e.to_string()).with_code(CATALOG_UNAVAILABLE))
            }
        };

        let (enhanced, keywords) = match &task.enhancement_result {
            Some(result) => (Some(result.enhanced_description.as_str()), result.keywords.as_slice()),
            None => (None, &[][..]),
        };
        StepOutcome::Success(PublicationContext {
            product: NormalizedProduct::from_snapshot(&product, enhanced, keywords),
            marketplace,
        })
    }

    /// Notification for `event` addressed to the marketplace hook, else the
    /// global one
    async fn notification_context(
        &self,
        task: &PublicationTask,
        event: WebhookEventType,
    ) -> StepOutcome<WebhookNotification> {
        let marketplace_url = match self.catalog.find_marketplace(task.marketplace_id).await {
            Ok(marketplace) => marketplace.and_then(|m| m.webhook_url),
            Err(e) => {
                return StepOutcome::Retryable(StepError::new(e.to_string()).with_code(CATALOG_UNAVAILABLE))
            }
        };
        StepOutcome::Success(
            self.notifier
                .dispatcher()
                .notification(event, task, marketplace_url.as_deref(), self.clock.now()),
        )
    }

    /// Best-effort, single-attempt notice that is never recorded on the task
    async fn fire_intermediate(&self, task: &PublicationTask, event: WebhookEventType) {
        if !self.notifier.dispatcher().intermediate_events_enabled() {
            return;
        }
        if let StepOutcome::Success(notification) = self.notification_context(task, event).await {
            self.notifier.dispatcher().fire_and_forget(notification);
        }
    }

    /// Persist an enhancement or publication outcome
    async fn apply_step_outcome<T, F>(
        &self,
        claimed: PublicationTask,
        step: StepName,
        outcome: StepOutcome<T>,
        record: F,
    ) -> Result<AdvanceOutcome>
    where
        F: FnOnce(&mut PublicationTask, T, DateTime<Utc>),
    {
        let now = self.clock.now();
        match outcome {
            StepOutcome::Success(result) => {
                let event = match step {
                    StepName::Enhancement => TaskEvent::EnhancementSucceeded,
                    _ => TaskEvent::PublicationSucceeded,
                };
                let mut next = claimed.clone();
                record(&mut next, result, now);
                self.complete_step(claimed, next, step, event).await
            }
            StepOutcome::Retryable(error) => {
                let mut next = claimed.clone();
                let retries = next.increment_retries(step);
                match self.retry_policy.decide(step, retries) {
                    RetryDecision::Retry { delay } => {
                        self.schedule_retry(claimed, next, step, retries, delay, error, now)
                            .await
                    }
                    RetryDecision::Exhausted => {
                        warn!(task_id = %claimed.task_id, step = %step, retries, "Retry budget exhausted");
                        self.fail_task(claimed, next, step, error, true, now).await
                    }
                }
            }
            StepOutcome::Permanent(error) => {
                let next = claimed.clone();
                self.fail_task(claimed, next, step, error, false, now).await
            }
        }
    }

    /// Mark `step` finished on `next`, move to the following status and queue
    /// the next step
    async fn complete_step(
        &self,
        claimed: PublicationTask,
        mut next: PublicationTask,
        step: StepName,
        event: TaskEvent,
    ) -> Result<AdvanceOutcome> {
        let from = claimed.status;
        next.status = determine_target_state(from, &event)?;
        next.add_step_completed(step);
        next.current_step = step.describe_finish().to_string();
        next.active_attempt = None;
        next.next_attempt_at = None;

        let Some(stored) = self.persist(claimed.version, &next).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        log_step_operation(
            "complete",
            stored.task_id,
            step.as_str(),
            claimed.retries(step) + 1,
            stored.status.as_str(),
            None,
        );
        self.publish_transition(&stored, from, step);

        match step {
            StepName::Enhancement => self.fire_intermediate(&stored, WebhookEventType::ProductEnhanced).await,
            StepName::Publication => self.fire_intermediate(&stored, WebhookEventType::ProductPublished).await,
            _ => {}
        }

        self.scheduler.schedule(
            WorkItem::Advance {
                task_id: stored.task_id,
                expected: stored.status,
            },
            Duration::ZERO,
        );

        Ok(AdvanceOutcome::Advanced {
            from,
            to: stored.status,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn schedule_retry(
        &self,
        claimed: PublicationTask,
        mut next: PublicationTask,
        step: StepName,
        retries: u32,
        delay: Duration,
        error: StepError,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome> {
        let max_attempts = self.retry_policy.max_attempts(step);
        let backoff = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        next.active_attempt = None;
        next.next_attempt_at = Some(now + backoff);
        if !next.is_terminal() {
            next.current_step = format!(
                "Retrying {step} in {}s (attempt {}/{max_attempts})",
                delay.as_secs(),
                retries + 1,
            );
        }

        let Some(stored) = self.persist(claimed.version, &next).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        log_step_operation(
            "retry_scheduled",
            stored.task_id,
            step.as_str(),
            retries,
            stored.status.as_str(),
            Some(&error.to_string()),
        );
        self.events.publish(
            TaskLifecycleEvent::new(
                event_names::TASK_RETRY_SCHEDULED,
                stored.task_id,
                Some(stored.status),
                stored.status,
            )
            .with_step(step)
            .with_context(json!({
                "retries": retries,
                "delay_seconds": delay.as_secs(),
                "error": error.message,
                "error_code": error.error_code,
            })),
        );

        if step == StepName::Publication {
            self.fire_intermediate(&stored, WebhookEventType::MarketplacePublishRetry)
                .await;
        }

        let item = if stored.status == TaskStatus::Failed {
            WorkItem::FailureNotification {
                task_id: stored.task_id,
            }
        } else {
            WorkItem::Advance {
                task_id: stored.task_id,
                expected: stored.status,
            }
        };
        self.scheduler.schedule(item, delay);

        Ok(AdvanceOutcome::RetryScheduled {
            step,
            retries,
            delay,
        })
    }

    async fn fail_task(
        &self,
        claimed: PublicationTask,
        mut next: PublicationTask,
        step: StepName,
        error: StepError,
        retries_exhausted: bool,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome> {
        let from = claimed.status;
        let event = TaskEvent::fail_with_error(step, error.message.clone());
        next.status = determine_target_state(from, &event)?;
        next.error_details = Some(ErrorDetails {
            step,
            error: error.message,
            error_code: error.error_code,
            upstream_response: error.upstream_response,
            retries: next.retries(step),
            retries_exhausted,
            failed_at: now,
        });
        next.completed_at.get_or_insert(now);
        next.current_step = format!("Failed during {step}");
        next.active_attempt = None;
        next.next_attempt_at = None;

        let Some(stored) = self.persist(claimed.version, &next).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        log_task_operation(
            "fail",
            stored.task_id,
            Some(stored.product_id),
            Some(stored.marketplace_id),
            stored.status.as_str(),
            event.error_message(),
        );
        self.publish_transition(&stored, from, step);
        self.scheduler.schedule(
            WorkItem::FailureNotification {
                task_id: stored.task_id,
            },
            Duration::ZERO,
        );

        Ok(AdvanceOutcome::Failed { step })
    }

    /// One recorded delivery attempt of `event`. Bumps the webhook counter on
    /// `next` when the attempt fails.
    async fn attempt_notification(
        &self,
        claimed: &PublicationTask,
        next: &mut PublicationTask,
        event: WebhookEventType,
    ) -> NotificationAttempt {
        let (url, outcome) = match self.notification_context(claimed, event).await {
            StepOutcome::Success(notification) => {
                let url = notification.url.clone();
                (url, self.notifier.execute(&notification).await)
            }
            StepOutcome::Retryable(error) => (None, StepOutcome::Retryable(error)),
            StepOutcome::Permanent(error) => (None, StepOutcome::Permanent(error)),
        };

        let now = self.clock.now();
        let step = StepName::Webhook;
        let result = match outcome {
            StepOutcome::Success(receipt) => {
                delivered_webhook_result(event, receipt, claimed.webhook_retries + 1, now)
            }
            StepOutcome::Retryable(error) => {
                let retries = next.increment_retries(step);
                match self.retry_policy.decide(step, retries) {
                    RetryDecision::Retry { delay } => {
                        return NotificationAttempt::Retry {
                            retries,
                            delay,
                            error,
                        }
                    }
                    RetryDecision::Exhausted => failed_webhook_result(event, url, &error, retries, now),
                }
            }
            StepOutcome::Permanent(error) => {
                failed_webhook_result(event, url, &error, claimed.webhook_retries + 1, now)
            }
        };

        log_webhook_operation(
            event.as_str(),
            claimed.task_id,
            result.url.as_deref(),
            result.status_code,
            if result.success { "delivered" } else { "failed" },
            result.error.as_deref(),
        );
        if !result.success {
            log_error(
                "webhook",
                event.as_str(),
                result.error.as_deref().unwrap_or("delivery failed"),
                Some(&format!("task_id={} attempts={}", claimed.task_id, result.attempts)),
            );
        }
        NotificationAttempt::Finished(result)
    }

    /// Success-path notification. Every outcome finishes the step; only
    /// `webhook_result` tells delivery apart from exhaustion.
    async fn run_completion_webhook(&self, claimed: PublicationTask) -> Result<AdvanceOutcome> {
        let step = StepName::Webhook;
        let mut next = claimed.clone();

        let result = match self
            .attempt_notification(&claimed, &mut next, WebhookEventType::WorkflowCompleted)
            .await
        {
            NotificationAttempt::Finished(result) => result,
            NotificationAttempt::Retry {
                retries,
                delay,
                error,
            } => {
                let now = self.clock.now();
                return self
                    .schedule_retry(claimed, next, step, retries, delay, error, now)
                    .await;
            }
        };

        let delivered = result.success;
        next.webhook_result = Some(result);
        let notice_task = next.clone();

        let outcome = self
            .complete_step(claimed, next, step, TaskEvent::WebhookFinished)
            .await?;
        if !delivered && matches!(outcome, AdvanceOutcome::Advanced { .. }) {
            self.fire_intermediate(&notice_task, WebhookEventType::WebhookMaxRetriesExceeded)
                .await;
        }
        Ok(outcome)
    }

    /// Deliver the final notification of a failed task. Retries on its own
    /// budget and records the outcome without touching the task status.
    pub async fn deliver_failure_notification(&self, task_id: Uuid) -> Result<AdvanceOutcome> {
        let task = self.task(task_id).await?;
        if task.status != TaskStatus::Failed {
            return Ok(AdvanceOutcome::Skipped(SkipReason::StatusMismatch));
        }
        if task.webhook_result.is_some() {
            return Ok(AdvanceOutcome::Skipped(SkipReason::AlreadyNotified));
        }
        let now = self.clock.now();
        if let Some(reason) = self.blocked(&task, now) {
            return Ok(AdvanceOutcome::Skipped(reason));
        }

        let step = StepName::Webhook;
        let Some(claimed) = self.claim(task, step, now).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        let event = failure_event(claimed.error_details.as_ref().map(|details| details.step));
        let mut next = claimed.clone();
        let result = match self.attempt_notification(&claimed, &mut next, event).await {
            NotificationAttempt::Finished(result) => result,
            NotificationAttempt::Retry {
                retries,
                delay,
                error,
            } => {
                let now = self.clock.now();
                return self
                    .schedule_retry(claimed, next, step, retries, delay, error, now)
                    .await;
            }
        };

        let delivered = result.success;
        next.webhook_result = Some(result);
        next.active_attempt = None;
        next.next_attempt_at = None;

        let Some(stored) = self.persist(claimed.version, &next).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        self.events.publish(
            TaskLifecycleEvent::new(
                event_names::NOTIFICATION_RECORDED,
                stored.task_id,
                Some(stored.status),
                stored.status,
            )
            .with_step(step)
            .with_context(json!({ "event": event.as_str(), "delivered": delivered })),
        );
        if !delivered {
            self.fire_intermediate(&stored, WebhookEventType::WebhookMaxRetriesExceeded)
                .await;
        }

        Ok(AdvanceOutcome::NotificationRecorded { delivered })
    }

    /// Close out a task whose notification step has finished
    async fn finalize(&self, task: PublicationTask, now: DateTime<Utc>) -> Result<AdvanceOutcome> {
        let from = task.status;
        let mut next = task.clone();
        next.status = determine_target_state(from, &TaskEvent::Finalize)?;
        next.add_step_completed(StepName::Finalize);
        next.current_step = StepName::Finalize.describe_finish().to_string();
        next.completed_at.get_or_insert(now);
        next.active_attempt = None;
        next.next_attempt_at = None;

        let Some(stored) = self.persist(task.version, &next).await? else {
            return Ok(AdvanceOutcome::Skipped(SkipReason::LostRace));
        };

        info!(
            task_id = %stored.task_id,
            product_id = stored.product_id,
            marketplace_id = stored.marketplace_id,
            elapsed_ms = stored.elapsed(now).num_milliseconds(),
            "Publication task completed"
        );
        log_task_operation(
            "complete",
            stored.task_id,
            Some(stored.product_id),
            Some(stored.marketplace_id),
            stored.status.as_str(),
            None,
        );
        self.publish_transition(&stored, from, StepName::Finalize);

        Ok(AdvanceOutcome::Advanced {
            from,
            to: stored.status,
        })
    }
}

#[async_trait]
impl WorkHandler for TaskStateMachine {
    async fn handle(&self, item: WorkItem) {
        match self.dispatch(item).await {
            Ok(outcome) => debug!(task_id = %item.task_id(), kind = item.kind(), ?outcome, "Work item handled"),
            Err(e) => log_error(
                "task_state_machine",
                item.kind(),
                &e.to_string(),
                Some(&format!("task_id={}", item.task_id())),
            ),
        }
    }
}
