//! Builds the flat index from knowledge entries, reusing persisted artifacts
//! when they still match

use std::time::Instant;

use tracing::{info, warn};

use super::{FlatIndex, IndexStore, SharedVectorIndex};
use crate::domain::knowledge::KnowledgeSet;
use crate::domain::{DomainError, VectorIndex};
use crate::infrastructure::embedding::TextEmbedder;

/// Operation label for embedding calls made while building
pub const INDEX_BUILD_OPERATION: &str = "index_build";

#[derive(Debug, Clone)]
pub struct IndexBuilder {
    embedder: TextEmbedder,
    store: Option<IndexStore>,
}

impl IndexBuilder {
    pub fn new(embedder: TextEmbedder) -> Self {
        Self {
            embedder: embedder.with_operation(INDEX_BUILD_OPERATION),
            store: None,
        }
    }

    pub fn with_store(mut self, store: IndexStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Embed every entry's query text
    pub async fn build(&self, knowledge: &KnowledgeSet) -> Result<FlatIndex, DomainError> {
        if knowledge.is_empty() {
            return Ok(FlatIndex::empty());
        }

        let start = Instant::now();
        let texts: Vec<String> = knowledge.entries().iter().map(|e| e.query.clone()).collect();
        let vectors = self.embedder.embed_all(&texts).await?;
        let index = FlatIndex::new(knowledge.entries().to_vec(), vectors)?;

        info!(
            entries = knowledge.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built vector index"
        );
        Ok(index)
    }

    /// Load the persisted index when it matches, otherwise build and persist
    pub async fn load_or_build(&self, knowledge: &KnowledgeSet) -> Result<FlatIndex, DomainError> {
        if let Some(store) = &self.store {
            match self.load_persisted(store, knowledge).await {
                Ok(Some(index)) => return Ok(index),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Could not read persisted index, rebuilding"),
            }
        }

        let index = self.build(knowledge).await?;
        self.persist(&index, knowledge).await;
        Ok(index)
    }

    /// Build off to the side, then swap into the shared handle and persist
    pub async fn rebuild_into(
        &self,
        shared: &SharedVectorIndex,
        knowledge: &KnowledgeSet,
    ) -> Result<(), DomainError> {
        let index = self.build(knowledge).await?;
        self.persist(&index, knowledge).await;
        shared.swap(index)
    }

    async fn load_persisted(
        &self,
        store: &IndexStore,
        knowledge: &KnowledgeSet,
    ) -> Result<Option<FlatIndex>, DomainError> {
        let store = store.clone();
        let setup = self.embedder.setup();
        let owned = knowledge.clone();

        let loaded = tokio::task::spawn_blocking(move || store.load(&owned, &setup))
            .await
            .map_err(|e| DomainError::internal(format!("Index load task failed: {}", e)))??;

        let Some(index) = loaded else {
            return Ok(None);
        };
        let Some(persisted) = index.dimension() else {
            return Ok(Some(index));
        };

        let current = self.current_dimension(knowledge).await?;
        if persisted != current {
            warn!(persisted, current, "Persisted index dimension mismatch, rebuilding");
            return Ok(None);
        }

        Ok(Some(index))
    }

    /// Dimension the embedder produces now
    ///
    /// Providers that do not report one are asked to embed the first entry;
    /// the vector is cached, so a rebuild does not pay for it twice.
    async fn current_dimension(&self, knowledge: &KnowledgeSet) -> Result<usize, DomainError> {
        if let Some(dimension) = self.embedder.expected_dimensions() {
            return Ok(dimension);
        }

        let sample = knowledge
            .entries()
            .first()
            .map(|entry| entry.query.as_str())
            .ok_or_else(|| DomainError::index("No entries to sample embedding dimension"))?;

        Ok(self.embedder.embed_text(sample).await?.len())
    }

    /// Persistence failures leave the in-memory index usable
    async fn persist(&self, index: &FlatIndex, knowledge: &KnowledgeSet) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let index = index.clone();
        let fingerprint = knowledge.fingerprint().to_string();
        let setup = self.embedder.setup();

        let result =
            tokio::task::spawn_blocking(move || store.save(&index, &fingerprint, &setup)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to persist vector index"),
            Err(e) => warn!(error = %e, "Index persist task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::knowledge::KnowledgeEntry;
    use crate::infrastructure::llm::RetryPolicy;
    use tempfile::tempdir;

    fn knowledge() -> KnowledgeSet {
        KnowledgeSet::new(vec![
            KnowledgeEntry::new("q1", "technical_support", "How do I reset my password?", "a"),
            KnowledgeEntry::new("q2", "billing_question", "When am I billed?", "b"),
        ])
        .unwrap()
    }

    fn builder(provider: Arc<MockEmbeddingProvider>, dir: &std::path::Path) -> IndexBuilder {
        builder_for_model(provider, "mock", dir)
    }

    fn builder_for_model(
        provider: Arc<MockEmbeddingProvider>,
        model: &str,
        dir: &std::path::Path,
    ) -> IndexBuilder {
        let embedder = TextEmbedder::new(provider, model)
            .with_retry(RetryPolicy::default().with_initial_delay(1));
        IndexBuilder::new(embedder).with_store(IndexStore::new(dir))
    }

    #[tokio::test]
    async fn test_second_start_reuses_persisted_index() {
        let dir = tempdir().unwrap();
        let set = knowledge();

        let first = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let built = builder(first.clone(), dir.path()).load_or_build(&set).await.unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(first.texts_embedded(), 2);

        let second = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let loaded = builder(second.clone(), dir.path()).load_or_build(&set).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dimension_change_forces_rebuild() {
        let dir = tempdir().unwrap();
        let set = knowledge();

        let small = Arc::new(MockEmbeddingProvider::new("mock", 8));
        builder(small, dir.path()).load_or_build(&set).await.unwrap();

        let large = Arc::new(MockEmbeddingProvider::new("mock", 32));
        let index = builder(large.clone(), dir.path()).load_or_build(&set).await.unwrap();

        assert_eq!(index.dimension(), Some(32));
        assert_eq!(large.texts_embedded(), 2);
    }

    #[tokio::test]
    async fn test_model_change_forces_rebuild() {
        let dir = tempdir().unwrap();
        let set = knowledge();

        let old = Arc::new(MockEmbeddingProvider::new("mock", 16));
        builder_for_model(old, "model-a", dir.path())
            .load_or_build(&set)
            .await
            .unwrap();

        let new = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let index = builder_for_model(new.clone(), "model-b", dir.path())
            .load_or_build(&set)
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(new.texts_embedded(), 2);

        let again = Arc::new(MockEmbeddingProvider::new("mock", 16));
        builder_for_model(again.clone(), "model-b", dir.path())
            .load_or_build(&set)
            .await
            .unwrap();
        assert_eq!(again.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unreported_dimension_is_sampled_on_load() {
        let dir = tempdir().unwrap();
        let set = knowledge();

        let small = Arc::new(MockEmbeddingProvider::new("mock", 8).without_reported_dimensions());
        builder(small, dir.path()).load_or_build(&set).await.unwrap();

        let large = Arc::new(MockEmbeddingProvider::new("mock", 32).without_reported_dimensions());
        let index = builder(large.clone(), dir.path())
            .load_or_build(&set)
            .await
            .unwrap();

        assert_eq!(index.dimension(), Some(32));
        assert_eq!(
            index.search(&large.vector_for("reset my password"), 1).unwrap()[0].id(),
            "q1"
        );
        // One sampled entry, then the full rebuild
        assert_eq!(large.texts_embedded(), 3);
    }

    #[tokio::test]
    async fn test_unreported_dimension_reuses_matching_index() {
        let dir = tempdir().unwrap();
        let set = knowledge();

        let first = Arc::new(MockEmbeddingProvider::new("mock", 8).without_reported_dimensions());
        builder(first, dir.path()).load_or_build(&set).await.unwrap();

        let second = Arc::new(MockEmbeddingProvider::new("mock", 8).without_reported_dimensions());
        let index = builder(second.clone(), dir.path())
            .load_or_build(&set)
            .await
            .unwrap();

        assert_eq!(index.dimension(), Some(8));
        assert_eq!(second.texts_embedded(), 1);
    }

    #[tokio::test]
    async fn test_build_failures_are_labelled_index_build() {
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 8).with_delay(200));
        let embedder = TextEmbedder::new(provider, "mock")
            .with_retry(RetryPolicy::no_retry().with_timeout(10));

        let error = IndexBuilder::new(embedder).build(&knowledge()).await.unwrap_err();

        assert!(matches!(
            error,
            DomainError::Timeout { provider, .. } if provider == INDEX_BUILD_OPERATION
        ));
    }

    #[tokio::test]
    async fn test_empty_knowledge_builds_empty_index() {
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 8));
        let embedder = TextEmbedder::new(provider.clone(), "mock");

        let index = IndexBuilder::new(embedder)
            .build(&KnowledgeSet::empty())
            .await
            .unwrap();

        assert!(index.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_swaps_shared_index() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let shared = SharedVectorIndex::default();

        builder(provider, dir.path())
            .rebuild_into(&shared, &knowledge())
            .await
            .unwrap();

        assert_eq!(shared.len(), 2);
        assert!(dir.path().join("index.bin").exists());
        assert!(dir.path().join("index.meta.json").exists());
    }
}
