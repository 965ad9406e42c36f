//! Per-client admission control for the pipeline endpoints

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;

const UNKNOWN_CLIENT: &str = "unknown";

/// Extractor that admits the request or rejects it with 429
#[derive(Debug, Clone)]
pub struct RateLimited {
    pub client: String,
    pub remaining: u32,
}

impl FromRequestParts<AppState> for RateLimited {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let client = client_id(parts);
        let result = state.rate_limiter.check_and_record(&client).await;

        if !result.allowed {
            warn!(client = %client, limit = result.limit, "Rate limit exceeded");
            return Err(ApiError::rate_limited(format!(
                "Rate limit exceeded. Max {} requests per {} seconds.",
                result.limit,
                state.rate_limiter.window().as_secs()
            ))
            .with_code("rate_limit_exceeded"));
        }

        debug!(client = %client, remaining = result.remaining, "Request admitted");

        Ok(RateLimited {
            client,
            remaining: result.remaining,
        })
    }
}

/// Client IP from the connection, when the server exposes it
fn client_id(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_client_id_uses_peer_ip() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 51000))));
        let (parts, _) = request.into_parts();

        assert_eq!(client_id(&parts), "10.1.2.3");
    }

    #[test]
    fn test_client_id_without_connect_info() {
        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(client_id(&parts), UNKNOWN_CLIENT);
    }
}
