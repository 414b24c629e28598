//! Per-client request throttling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one request for `key`; false when `limit` is already used up in the current window.
    async fn check(&self, key: &str, limit: u32) -> bool;
}

struct WindowCount {
    started: Instant,
    count: u32,
}

/// Fixed-window counter kept in process memory.
pub struct MemoryRateLimiter {
    period: Duration,
    windows: Mutex<HashMap<String, WindowCount>>,
}

impl MemoryRateLimiter {
    pub fn new(period: Duration) -> Self {
        MemoryRateLimiter {
            period,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        // Expired windows are dropped lazily so the map stays bounded by active clients.
        windows.retain(|_, w| now.duration_since(w.started) < self.period);
        let window = windows.entry(key.to_string()).or_insert(WindowCount { started: now, count: 0 });
        if window.count >= limit {
            return false;
        }
        window.count += 1;
        true
    }
}
