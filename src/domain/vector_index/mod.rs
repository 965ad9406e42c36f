//! Nearest-neighbor search over knowledge entry embeddings

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::knowledge::KnowledgeEntry;
use super::DomainError;

/// A search hit
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: Arc<KnowledgeEntry>,
    pub score: f32,
}

impl ScoredEntry {
    pub fn new(entry: Arc<KnowledgeEntry>, score: f32) -> Self {
        Self { entry, score }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }
}

/// Order hits by descending score, ties by ascending id
pub fn rank_order(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id().cmp(b.id()))
}

/// Vector index backend
///
/// `search` returns at most `k` hits ordered by [`rank_order`]. An empty
/// index or `k == 0` yields no hits; a query of the wrong dimension is an
/// [`DomainError::Index`] error.
pub trait VectorIndex: Send + Sync + Debug {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>, DomainError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, `None` while the index holds nothing
    fn dimension(&self) -> Option<usize>;
}

/// Embedding model and requested vector size an index was built with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSetup {
    pub model: String,
    pub requested_dimensions: Option<usize>,
}

impl EmbeddingSetup {
    pub fn new(model: impl Into<String>, requested_dimensions: Option<usize>) -> Self {
        Self {
            model: model.into(),
            requested_dimensions,
        }
    }
}

/// Sidecar describing a persisted index blob
///
/// Sidecars written before the embedding setup was recorded deserialize
/// with an empty model and never match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub entry_count: usize,
    pub content_fingerprint: String,
    pub dimension: usize,
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub embedding: EmbeddingSetup,
}

impl IndexMetadata {
    /// Whether this artifact was built from the given entry set
    pub fn matches(&self, entry_count: usize, fingerprint: &str, ids: &[String]) -> bool {
        self.entry_count == entry_count
            && self.content_fingerprint == fingerprint
            && self.ids.as_slice() == ids
    }

    /// Whether this artifact was embedded the way `setup` would embed
    pub fn embedded_with(&self, setup: &EmbeddingSetup) -> bool {
        &self.embedding == setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> ScoredEntry {
        ScoredEntry::new(Arc::new(KnowledgeEntry::new(id, "other", "q", "a")), score)
    }

    #[test]
    fn test_rank_order_breaks_ties_by_id() {
        let mut hits = vec![hit("b", 0.5), hit("c", 0.9), hit("a", 0.5)];
        hits.sort_by(rank_order);

        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_metadata_matches() {
        let meta = IndexMetadata {
            entry_count: 2,
            content_fingerprint: "abc".into(),
            dimension: 8,
            ids: vec!["a".into(), "b".into()],
            embedding: EmbeddingSetup::new("text-embedding-3-small", None),
        };

        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(meta.matches(2, "abc", &ids));
        assert!(!meta.matches(2, "def", &ids));
        assert!(!meta.matches(3, "abc", &ids));
        assert!(!meta.matches(2, "abc", &ids[..1]));
    }

    #[test]
    fn test_metadata_embedding_setup() {
        let json = r#"{"entry_count":1,"content_fingerprint":"abc","dimension":3,"ids":["a"]}"#;
        let legacy: IndexMetadata = serde_json::from_str(json).unwrap();

        let setup = EmbeddingSetup::new("text-embedding-3-small", Some(3));
        assert!(!legacy.embedded_with(&setup));

        let current = IndexMetadata {
            embedding: setup.clone(),
            ..legacy
        };
        assert!(current.embedded_with(&setup));
        assert!(!current.embedded_with(&EmbeddingSetup::new("text-embedding-3-small", None)));
        assert!(!current.embedded_with(&EmbeddingSetup::new("text-embedding-3-large", Some(3))));

        let written = serde_json::to_value(&current).unwrap();
        assert_eq!(written["model"], "text-embedding-3-small");
        assert_eq!(written["requested_dimensions"], 3);
    }
}
