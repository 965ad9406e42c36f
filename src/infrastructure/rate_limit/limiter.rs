//! Sliding window rate limiting per client

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

/// Admission limits
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    #[serde(default = "default_requests")]
    pub requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Total limit for the window
    pub limit: u32,
    /// Time until the oldest request leaves the window (in seconds)
    pub reset_in_seconds: u64,
}

/// In-memory rate limiter keyed by client id
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    /// Per-client request timestamps
    records: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_window(config.requests, Duration::from_secs(config.window_seconds))
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: Arc::new(RwLock::new(HashMap::new())),
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and, when allowed, record the request in one step
    pub async fn check_and_record(&self, client: &str) -> RateLimitResult {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut records = self.records.write().await;
        let timestamps = records.entry(client.to_string()).or_default();

        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() as u32 >= self.limit {
            let reset_in = timestamps
                .iter()
                .min()
                .map(|oldest| {
                    self.window
                        .saturating_sub(now.duration_since(*oldest))
                        .as_secs()
                })
                .unwrap_or(self.window.as_secs());

            return RateLimitResult {
                allowed: false,
                remaining: 0,
                limit: self.limit,
                reset_in_seconds: reset_in,
            };
        }

        timestamps.push(now);

        RateLimitResult {
            allowed: true,
            remaining: self.limit.saturating_sub(timestamps.len() as u32),
            limit: self.limit,
            reset_in_seconds: self.window.as_secs(),
        }
    }

    async fn maybe_cleanup(&self) {
        let should_cleanup = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if should_cleanup {
            let mut last = self.last_cleanup.write().await;
            *last = Instant::now();

            let now = Instant::now();
            let mut records = self.records.write().await;

            for timestamps in records.values_mut() {
                timestamps.retain(|t| now.duration_since(*t) < self.window);
            }

            records.retain(|_, v| !v.is_empty());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
