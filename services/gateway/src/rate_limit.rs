use crate::error::AppError;
use dashmap::DashMap;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter per principal+endpoint key.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Count one request against `key`, allowing at most `max_per_minute`.
    pub fn check(&self, key: &str, max_per_minute: u32) -> Result<(), AppError> {
        let mut window = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            started: Instant::now(),
            count: 0,
        });
        if window.started.elapsed() >= WINDOW {
            window.started = Instant::now();
            window.count = 0;
        }
        window.count += 1;
        if window.count > max_per_minute {
            return Err(AppError::RateLimited(format!("rate limit for {}", key)));
        }
        Ok(())
    }
}
