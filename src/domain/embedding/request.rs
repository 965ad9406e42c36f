//! Embedding request types

use serde::{Deserialize, Serialize};

/// Texts to embed in one provider call, answered in the same order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    model: String,
    texts: Vec<String>,
    /// Requested output dimensions, for models that can shorten vectors
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn batch(model: impl Into<String>, texts: Vec<String>) -> Self {
        Self {
            model: model.into(),
            texts,
            dimensions: None,
        }
    }

    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::batch(model, vec![text.into()])
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}
