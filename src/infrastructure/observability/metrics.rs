//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::{Disposition, Stage};

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("answer_pipeline_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record how long a pipeline stage took
pub fn record_stage(stage: Stage, duration: Duration) {
    histogram!("pipeline_stage_duration_seconds", "stage" => stage.as_str())
        .record(duration.as_secs_f64());
}

/// Record the arbiter's final disposition
pub fn record_decision(disposition: Disposition) {
    counter!("pipeline_decisions_total", "decision" => disposition.as_str()).increment(1);
}

/// Record a run aborted by a failing stage
pub fn record_failure(stage: Option<Stage>) {
    let stage = stage.map(|s| s.as_str()).unwrap_or("input");
    counter!("pipeline_failures_total", "stage" => stage).increment(1);
}

/// Outcome class of an HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpOutcome {
    Ok,
    InvalidRequest,
    RateLimited,
    UpstreamFailure,
    Unavailable,
    ServerError,
}

impl HttpOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InvalidRequest => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::UpstreamFailure => "upstream_failure",
            Self::Unavailable => "unavailable",
            Self::ServerError => "server_error",
        }
    }
}

/// Record an API request by endpoint, outcome and failed stage
pub fn record_http_request(
    endpoint: &str,
    outcome: HttpOutcome,
    failed_stage: Option<Stage>,
    duration: Duration,
) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("outcome", outcome.as_str().to_string()),
        (
            "stage",
            failed_stage.map(|s| s.as_str()).unwrap_or("none").to_string(),
        ),
    ];

    counter!("api_requests_total", &labels).increment(1);
    histogram!("api_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a retried upstream call under its operation label
pub fn record_retry(operation: &'static str) {
    counter!("upstream_retries_total", "operation" => operation).increment(1);
}
