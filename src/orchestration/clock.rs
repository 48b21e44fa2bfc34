//! Wall-clock time derived from the tokio clock.
//!
//! Backoff windows and claim leases are compared against this clock so that
//! they move together with `tokio::time` sleeps, including when the tokio
//! clock is paused.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct PipelineClock {
    wall_origin: DateTime<Utc>,
    origin: Instant,
}

impl Default for PipelineClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineClock {
    pub fn new() -> Self {
        Self {
            wall_origin: Utc::now(),
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + elapsed
    }
}
