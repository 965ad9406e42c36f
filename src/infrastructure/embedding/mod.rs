//! Embedding provider implementations

mod cached;
mod openai;

pub use cached::TextEmbedder;
pub use openai::OpenAiEmbeddingProvider;

pub use super::llm::{HttpClient, HttpClientTrait};
