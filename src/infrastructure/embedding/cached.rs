//! Text embedder with a text-keyed cache and bounded retry

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use crate::domain::{DomainError, EmbeddingProvider, EmbeddingRequest, EmbeddingSetup, Stage};
use crate::infrastructure::llm::RetryPolicy;

const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds text through a provider, caching vectors by exact text
#[derive(Debug, Clone)]
pub struct TextEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    dimensions: Option<usize>,
    retry: RetryPolicy,
    batch_size: usize,
    operation: &'static str,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl TextEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions: None,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            operation: Stage::Retrieval.as_str(),
            cache: Cache::builder().max_capacity(10_000).build(),
        }
    }

    /// Request shortened vectors from models that support it
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache = Cache::builder().max_capacity(capacity).build();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Label for timeouts, retry logs and the retry counter
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    pub fn setup(&self) -> EmbeddingSetup {
        EmbeddingSetup::new(&self.model, self.dimensions)
    }

    /// Dimension of produced vectors, when known up front
    pub fn expected_dimensions(&self) -> Option<usize> {
        self.dimensions
            .or_else(|| self.provider.dimensions(&self.model))
    }

    /// Embed one text, serving repeats from the cache
    pub async fn embed_text(&self, text: &str) -> Result<Arc<Vec<f32>>, DomainError> {
        if let Some(cached) = self.cache.get(text).await {
            debug!(model = %self.model, "Embedding cache hit");
            return Ok(cached);
        }

        let mut vectors = self.request(vec![text.to_string()]).await?;
        let vector = Arc::new(vectors.pop().ok_or_else(|| {
            DomainError::provider(self.provider.provider_name(), "Empty embedding response")
        })?);

        self.cache.insert(text.to_string(), vector.clone()).await;
        Ok(vector)
    }

    /// Embed many texts in provider-sized batches, preserving input order
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let batch = self.request(chunk.to_vec()).await?;
            for (text, vector) in chunk.iter().zip(batch.iter()) {
                self.cache.insert(text.clone(), Arc::new(vector.clone())).await;
            }
            vectors.extend(batch);
        }

        Ok(vectors)
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, DomainError> {
        let expected = texts.len();
        let provider = &self.provider;
        let model = self.model.as_str();
        let dimensions = self.dimensions;
        let texts = &texts;

        let vectors = self
            .retry
            .run(
                self.operation,
                move || async move {
                    let mut request = EmbeddingRequest::batch(model, texts.clone());
                    if let Some(dims) = dimensions {
                        request = request.with_dimensions(dims);
                    }
                    provider.embed(request).await
                },
                DomainError::is_transient,
            )
            .await?
            .into_ordered_vectors();

        if vectors.len() != expected {
            return Err(DomainError::provider(
                provider.provider_name(),
                format!("Expected {} embeddings, received {}", expected, vectors.len()),
            ));
        }

        Ok(vectors)
    }
}
