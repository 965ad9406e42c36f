//! Application state shared by the handlers

use std::sync::Arc;

use crate::domain::VectorIndex;
use crate::infrastructure::pipeline::Pipeline;
use crate::infrastructure::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub index: Arc<dyn VectorIndex>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        index: Arc<dyn VectorIndex>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            pipeline,
            index,
            rate_limiter,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("index_entries", &self.index.len())
            .field("rate_limit", &self.rate_limiter.limit())
            .finish()
    }
}
