//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_decision, HttpOutcome, record_failure, record_http_request,
    record_retry, record_stage, PrometheusMetrics,
};
