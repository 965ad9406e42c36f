//! Embedding response types

use serde::{Deserialize, Serialize};

/// A single embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// Index of this embedding in the batch
    index: usize,
    embedding: Vec<f32>,
}

impl Embedding {
    pub fn new(index: usize, embedding: Vec<f32>) -> Self {
        Self { index, embedding }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.embedding
    }
}

/// Cosine similarity; mismatched, empty or zero-norm inputs score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Usage statistics for an embedding request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

impl EmbeddingUsage {
    pub fn new(prompt_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            total_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }
}

/// Response from an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    model: String,
    data: Vec<Embedding>,
    usage: EmbeddingUsage,
}

impl EmbeddingResponse {
    pub fn new(model: impl Into<String>, data: Vec<Embedding>, usage: EmbeddingUsage) -> Self {
        Self {
            model: model.into(),
            data,
            usage,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn usage(&self) -> &EmbeddingUsage {
        &self.usage
    }

    /// Vectors ordered by their batch index, regardless of response order
    pub fn into_ordered_vectors(self) -> Vec<Vec<f32>> {
        let mut data = self.data;
        data.sort_by_key(|e| e.index());
        data.into_iter().map(Embedding::into_vector).collect()
    }
}
