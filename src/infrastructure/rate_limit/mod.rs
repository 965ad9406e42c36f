//! Request admission

mod limiter;

pub use limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
