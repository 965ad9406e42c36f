use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::pipeline;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::banner))
        .route("/health", get(health::health_check))
        .route("/process", post(pipeline::process))
        .route("/classify", post(pipeline::classify))
        .route("/retrieve", post(pipeline::retrieve))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Router plus the Prometheus scrape endpoint when metrics are enabled
pub fn create_router_with_metrics(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    metrics_path: &str,
) -> Router {
    let router = create_router(state);

    match metrics {
        Some(m) => router.merge(create_metrics_router(m, metrics_path)),
        None => router,
    }
}
