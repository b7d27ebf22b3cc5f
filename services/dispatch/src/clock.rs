//! Monotonic wall-clock
//!
//! Pins a Unix epoch offset at construction and measures everything after
//! that with the tokio clock, so `now_ms` never goes backwards and phase
//! deadlines line up with `tokio::time::sleep`. Under a paused test runtime
//! the same clock follows virtual time.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch_ms: i64,
    started: Instant,
}

impl Clock {
    /// Clock anchored at the current system time.
    pub fn start() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self::start_at(epoch_ms)
    }

    /// Clock anchored at an explicit epoch, for tests.
    pub fn start_at(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the Unix epoch, monotonic within this process.
    pub fn now_ms(&self) -> i64 {
        self.epoch_ms + self.started.elapsed().as_millis() as i64
    }
}
