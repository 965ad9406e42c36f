//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpClientTrait;
use crate::domain::embedding::{
    Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
};
use crate::domain::DomainError;
use crate::infrastructure::llm::DEFAULT_OPENAI_BASE_URL;

/// Known embedding models and their native dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, request: &EmbeddingRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model(),
            "input": request.texts(),
            "encoding_format": "float",
        });

        if let Some(dims) = request.dimensions() {
            body["dimensions"] = serde_json::json!(dims);
        }

        body
    }

    fn parse_response(
        &self,
        json: serde_json::Value,
        expected: usize,
    ) -> Result<EmbeddingResponse, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        if response.data.len() != expected {
            return Err(DomainError::provider(
                "openai",
                format!(
                    "Expected {} embeddings, received {}",
                    expected,
                    response.data.len()
                ),
            ));
        }

        let embeddings: Vec<Embedding> = response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.index, d.embedding))
            .collect();

        let usage = response
            .usage
            .map(|u| EmbeddingUsage::new(u.prompt_tokens, u.total_tokens))
            .unwrap_or_default();

        Ok(EmbeddingResponse::new(response.model, embeddings, usage))
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        let body = self.build_request(&request);
        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        self.parse_response(response, request.texts().len())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn dimensions(&self, model: &str) -> Option<usize> {
        EMBEDDING_MODELS
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, dims)| *dims)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: String,
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::MockHttpClient;

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    fn vectors_response(count: usize, dimensions: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .rev()
            .map(|i| {
                let embedding: Vec<f32> = (0..dimensions).map(|j| (i + j) as f32 * 0.01).collect();
                serde_json::json!({ "index": i, "embedding": embedding, "object": "embedding" })
            })
            .collect();

        serde_json::json!({
            "model": "text-embedding-3-small",
            "data": data,
            "usage": { "prompt_tokens": 6, "total_tokens": 6 }
        })
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let client = MockHttpClient::new().with_response(TEST_URL, vectors_response(2, 4));
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        let response = provider
            .embed(EmbeddingRequest::batch(
                "text-embedding-3-small",
                vec!["reset password".into(), "billing cycle".into()],
            ))
            .await
            .unwrap();

        assert_eq!(response.usage().total_tokens(), 6);
        let vectors = response.into_ordered_vectors();
        assert_eq!(vectors[0][0], 0.0);
        assert_eq!(vectors[1][0], 0.01);
    }

    #[tokio::test]
    async fn test_request_body() {
        let client = MockHttpClient::new().with_response(TEST_URL, vectors_response(1, 4));
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        provider
            .embed(EmbeddingRequest::single("text-embedding-3-small", "hello").with_dimensions(4))
            .await
            .unwrap();

        let body = &provider.client.bodies()[0];
        assert_eq!(body["input"], serde_json::json!(["hello"]));
        assert_eq!(body["dimensions"], 4);
        assert_eq!(body["encoding_format"], "float");
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let client = MockHttpClient::new().with_response(TEST_URL, vectors_response(1, 4));
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        let result = provider
            .embed(EmbeddingRequest::batch("m", vec!["a".into(), "b".into()]))
            .await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_embed_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "Rate limit exceeded");
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        let result = provider.embed(EmbeddingRequest::single("m", "Hello")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_known_dimensions() {
        let provider = OpenAiEmbeddingProvider::new(MockHttpClient::new(), "key");

        assert_eq!(provider.dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(provider.dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(provider.dimensions("unknown-model"), None);
    }
}
