//! Per-endpoint request metrics
//!
//! Requests are labelled by route template, outcome class and, for pipeline
//! failures, the stage that failed. Paths no route matched share one
//! `unmatched` label so scanners cannot inflate label cardinality.

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::domain::Stage;
use crate::infrastructure::observability::{record_http_request, HttpOutcome};

const UNMATCHED_ENDPOINT: &str = "unmatched";

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = endpoint(&request);

    let response = next.run(request).await;

    let failed_stage = response.extensions().get::<Stage>().copied();
    record_http_request(
        &endpoint,
        outcome(response.status()),
        failed_stage,
        start.elapsed(),
    );

    response
}

fn endpoint(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

fn outcome(status: StatusCode) -> HttpOutcome {
    match status {
        StatusCode::TOO_MANY_REQUESTS => HttpOutcome::RateLimited,
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => HttpOutcome::UpstreamFailure,
        StatusCode::SERVICE_UNAVAILABLE => HttpOutcome::Unavailable,
        s if s.is_client_error() => HttpOutcome::InvalidRequest,
        s if s.is_server_error() => HttpOutcome::ServerError,
        _ => HttpOutcome::Ok,
    }
}
