//! Deferred work: scheduling, and the worker pool that drains it.
//!
//! A step waiting on backoff holds no worker. Its follow-up is a
//! [`WorkItem`] handed to a [`WorkScheduler`] with a delay, and a
//! [`WorkerPool`] picks it up once the delay has elapsed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state_machine::TaskStatus;

/// Unit of asynchronous work for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkItem {
    /// Run the next step, provided the task is still in `expected` status
    Advance { task_id: Uuid, expected: TaskStatus },
    /// Deliver (or retry) the final notification of a failed task
    FailureNotification { task_id: Uuid },
}

impl WorkItem {
    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Advance { task_id, .. } | Self::FailureNotification { task_id } => *task_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::FailureNotification { .. } => "failure_notification",
        }
    }
}

/// Queue work to run after `delay`
pub trait WorkScheduler: Send + Sync {
    fn schedule(&self, item: WorkItem, delay: Duration);
}

/// Consumer side of the scheduler
#[async_trait]
pub trait WorkHandler: Send + Sync {
    async fn handle(&self, item: WorkItem);
}

/// Scheduler backed by tokio timers and an unbounded channel
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<WorkItem>,
}

impl TokioScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkItem>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WorkScheduler for TokioScheduler {
    fn schedule(&self, item: WorkItem, delay: Duration) {
        if delay.is_zero() {
            if self.sender.send(item).is_err() {
                warn!(task_id = %item.task_id(), kind = item.kind(), "Work queue closed, dropping item");
            }
            return;
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(item).is_err() {
                warn!(task_id = %item.task_id(), kind = item.kind(), "Work queue closed, dropping item");
            }
        });
    }
}

/// Bounded-concurrency consumer of scheduled work
pub struct WorkerPool;

/// Running pool; dropping it does not stop the workers, call `shutdown`
pub struct WorkerPoolHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl WorkerPoolHandle {
    /// Stop accepting work and wait for in-flight items to finish
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Worker pool terminated abnormally");
        }
    }
}

impl WorkerPool {
    pub fn spawn(
        handler: Arc<dyn WorkHandler>,
        mut receiver: mpsc::UnboundedReceiver<WorkItem>,
        concurrency: usize,
    ) -> WorkerPoolHandle {
        let shutdown = Arc::new(Notify::new());
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let stop = shutdown.clone();

        let join = tokio::spawn(async move {
            info!(concurrency, "Worker pool started");
            loop {
                let item = tokio::select! {
                    _ = stop.notified() => break,
                    item = receiver.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    debug!(task_id = %item.task_id(), kind = item.kind(), "Handling work item");
                    handler.handle(item).await;
                    drop(permit);
                });
            }

            // wait for in-flight handlers
            let _ = semaphore.acquire_many(concurrency.max(1) as u32).await;
            info!("Worker pool stopped");
        });

        WorkerPoolHandle { shutdown, join }
    }
}
