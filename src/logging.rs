//! # Structured Logging
//!
//! Console output plus a daily-rolling JSON file, so the records of many
//! concurrent publication tasks can be filtered by `task_id` afterwards.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the environment
//! (`production` logs at `info`, everything else at `debug`). The file sink
//! lives under `PUBLISHER_LOG_DIR`, defaulting to `log/`.

use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

const LOG_FILE_PREFIX: &str = "publisher.log";

/// Keeps the non-blocking file writer flushing for the life of the process
static FILE_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Install the global subscriber once. Later calls, and calls made after some
/// other subscriber was installed, are no-ops.
pub fn init_structured_logging() {
    FILE_GUARD.get_or_init(|| {
        let environment = environment();
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(&environment)));

        let console = fmt::layer().with_target(true).with_filter(filter());

        let log_dir = log_directory();
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            if tracing_subscriber::registry().with(console).try_init().is_ok() {
                tracing::warn!(error = %e, dir = %log_dir.display(), "Log directory unavailable, console logging only");
            }
            return None;
        }

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));
        let file = fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_current_span(false)
            .with_filter(filter());

        if tracing_subscriber::registry().with(console).with(file).try_init().is_err() {
            tracing::debug!("Global subscriber already installed, keeping it");
            return None;
        }

        tracing::info!(
            environment = %environment,
            dir = %log_dir.display(),
            pid = std::process::id(),
            "Structured logging initialized"
        );
        Some(guard)
    });
}

fn environment() -> String {
    std::env::var("PUBLISHER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn log_directory() -> PathBuf {
    std::env::var_os("PUBLISHER_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("log"))
}

fn default_level(environment: &str) -> &'static str {
    if environment == "production" {
        "info"
    } else {
        "debug"
    }
}

/// Task lifecycle record (create, fail, complete)
pub fn log_task_operation(
    operation: &str,
    task_id: Uuid,
    product_id: Option<i64>,
    marketplace_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        target: "publisher::task",
        operation,
        %task_id,
        product_id,
        marketplace_id,
        status,
        details,
        "task operation"
    );
}

/// Step record (claim, complete, retry_scheduled)
pub fn log_step_operation(
    operation: &str,
    task_id: Uuid,
    step: &str,
    attempt: u32,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        target: "publisher::step",
        operation,
        %task_id,
        step,
        attempt,
        status,
        details,
        "step operation"
    );
}

pub fn log_webhook_operation(
    event: &str,
    task_id: Uuid,
    url: Option<&str>,
    status_code: Option<u16>,
    outcome: &str,
    details: Option<&str>,
) {
    tracing::info!(
        target: "publisher::webhook",
        event,
        %task_id,
        url,
        status_code,
        outcome,
        details,
        "webhook delivery"
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(component, operation, error, context, "operation failed");
}
