//! # Lifecycle Events
//!
//! Observers subscribe to [`EventPublisher`] to follow every persisted task
//! transition without polling the store.

pub mod publisher;

pub use publisher::{EventPublisher, TaskLifecycleEvent};
