//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;

/// Trait for embedding providers
///
/// Implementations must be deterministic for identical input so that
/// vectors can be cached by text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate embeddings for the given input
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError>;

    fn provider_name(&self) -> &'static str;

    /// Get the embedding dimensions for a model
    fn dimensions(&self, model: &str) -> Option<usize>;
}
