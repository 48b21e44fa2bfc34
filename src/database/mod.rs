//! # Task Storage
//!
//! Persistence for publication tasks behind the [`TaskStore`] trait.
//!
//! ## Key Components
//!
//! - [`store`] - Storage contract and error types
//! - [`memory`] - `DashMap` store for tests and single-process runs
//! - [`postgres`] - SQLx store over the `publication_tasks` table
//! - [`connection`] - Pool construction from [`crate::config::DatabaseConfig`]
//!
//! ## Concurrency
//!
//! All updates after creation are compare-and-set on the task `version`.

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::DatabaseConnection;
pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;
pub use store::{StoreError, StoreResult, TaskCount, TaskListQuery, TaskPage, TaskStore};
