//! Retrieves rendered knowledge entries nearest to a query

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{
    ContextDocument, ContextRetriever, DomainError, PipelineError, Stage, VectorIndex,
};

use crate::infrastructure::embedding::TextEmbedder;

/// Embeds the query and searches the shared index
///
/// Holds no per-request state; safe to call whatever the classifier decided.
#[derive(Debug, Clone)]
pub struct KnowledgeRetriever {
    embedder: TextEmbedder,
    index: Arc<dyn VectorIndex>,
}

impl KnowledgeRetriever {
    pub fn new(embedder: TextEmbedder, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Rendered documents only, most similar first
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<String>, PipelineError> {
        let docs = self.retrieve_entries(text, k).await?;
        Ok(docs.into_iter().map(|doc| doc.text).collect())
    }
}

#[async_trait]
impl ContextRetriever for KnowledgeRetriever {
    async fn retrieve_entries(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ContextDocument>, PipelineError> {
        if k == 0 || self.index.is_empty() {
            debug!(k, entries = self.index.len(), "Nothing to retrieve");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let query_vector = self
            .embedder
            .embed_text(text)
            .await
            .map_err(|e| PipelineError::from_domain(Stage::Retrieval, e))?;

        let hits = self
            .index
            .search(&query_vector, k)
            .map_err(|e| match e {
                DomainError::Index { message } => PipelineError::index_unavailable(message),
                other => PipelineError::from_domain(Stage::Retrieval, other),
            })?;

        info!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved context"
        );

        Ok(hits
            .into_iter()
            .map(|hit| ContextDocument::new(hit.entry.id.clone(), hit.entry.render()))
            .collect())
    }
}
