#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Publisher Core
//!
//! Task orchestration core for publishing catalog products to third-party
//! marketplaces.
//!
//! ## Overview
//!
//! Each publish request becomes a long-running task for one (product,
//! marketplace) pair. The task moves through a fixed pipeline:
//!
//! ```text
//! pending → enhancing → enhanced → publishing → published → webhook_sent → completed
//!                                                    (any non-terminal) → failed
//! ```
//!
//! Every external call (AI content enhancement, marketplace submission, webhook
//! delivery) is wrapped by a step executor that reports `success`,
//! `retryable` or `permanent`. The state machine persists each transition with
//! a versioned compare-and-set before moving on, and schedules retries as new
//! units of work instead of blocking a worker.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Task statuses, the transition table and the orchestrator
//! - [`orchestration`] - Step executors, retry policy, scheduler and worker pool
//! - [`marketplaces`] - Marketplace strategies keyed by slug, with per-marketplace error tables
//! - [`enhancement`] - AI content capability
//! - [`webhooks`] - Event payloads, HMAC signing and delivery
//! - [`services`] - Read-side task queries
//! - [`database`] - Task storage (in-memory and PostgreSQL)
//! - [`catalog`] - Product and marketplace lookups
//! - [`config`] - YAML configuration with environment overrides
//! - [`events`] - In-process lifecycle events
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use publisher_core::catalog::InMemoryCatalog;
//! use publisher_core::config::ConfigManager;
//! use publisher_core::database::InMemoryTaskStore;
//! use publisher_core::enhancement::OpenAiContentEnhancer;
//! use publisher_core::events::EventPublisher;
//! use publisher_core::marketplaces::{HttpMarketplaceTransport, MarketplaceRegistry};
//! use publisher_core::orchestration::{TokioScheduler, WorkerPool};
//! use publisher_core::state_machine::{PipelineDependencies, TaskStateMachine};
//! use publisher_core::webhooks::HttpWebhookTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! let execution = &config.execution;
//!
//! let (scheduler, receiver) = TokioScheduler::channel();
//! let marketplace_transport = HttpMarketplaceTransport::new(
//!     execution.publication_timeout(),
//!     &config.webhook.user_agent,
//! )?;
//!
//! let machine = Arc::new(TaskStateMachine::new(
//!     PipelineDependencies {
//!         store: Arc::new(InMemoryTaskStore::new()),
//!         catalog: Arc::new(InMemoryCatalog::new()),
//!         content_enhancer: Arc::new(OpenAiContentEnhancer::new(
//!             config.enhancer.clone(),
//!             execution.enhancement_timeout(),
//!         )?),
//!         marketplaces: Arc::new(MarketplaceRegistry::with_builtin(Arc::new(marketplace_transport))),
//!         webhook_transport: Arc::new(HttpWebhookTransport::new(
//!             execution.webhook_timeout(),
//!             &config.webhook.user_agent,
//!         )?),
//!         scheduler: Arc::new(scheduler),
//!         events: EventPublisher::default(),
//!     },
//!     config,
//! ));
//!
//! let pool = WorkerPool::spawn(machine.clone(), receiver, execution.worker_concurrency);
//! let task = machine.create(123, 456).await?;
//! println!("Queued task {}", task.task_id);
//! # pool.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod catalog;
pub mod config;
pub mod constants;
pub mod database;
pub mod enhancement;
pub mod error;
pub mod events;
pub mod logging;
pub mod marketplaces;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod webhooks;

pub use config::{ConfigManager, PublisherConfig};
pub use error::{ErrorResponse, PublisherError, Result};
pub use models::{PublicationTask, StepClaim};
pub use orchestration::{RetryPolicy, StepOutcome};
pub use services::{ProductTaskList, TaskQueryService};
pub use state_machine::{
    AdvanceOutcome, PipelineDependencies, StepName, TaskStateMachine, TaskStatus,
};
