//! API middleware components

pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use rate_limit::RateLimited;
