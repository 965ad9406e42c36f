//! Exact cosine-similarity index over a contiguous vector buffer

use std::sync::Arc;

use crate::domain::knowledge::KnowledgeEntry;
use crate::domain::vector_index::{rank_order, ScoredEntry, VectorIndex};
use crate::domain::{cosine_similarity, DomainError};

/// Flat index: one row of `dimension` floats per entry, scanned in full
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<Arc<KnowledgeEntry>>,
    vectors: Vec<f32>,
    dimension: usize,
}

impl FlatIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from entries and their vectors, paired by position
    pub fn new(
        entries: Vec<Arc<KnowledgeEntry>>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, DomainError> {
        if entries.len() != vectors.len() {
            return Err(DomainError::index(format!(
                "{} entries but {} vectors",
                entries.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if !entries.is_empty() && dimension == 0 {
            return Err(DomainError::index("Embedding vectors must not be empty"));
        }

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for (entry, vector) in entries.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(DomainError::index(format!(
                    "Entry '{}' has dimension {}, expected {}",
                    entry.id,
                    vector.len(),
                    dimension
                )));
            }
            flat.extend(vector);
        }

        Ok(Self {
            entries,
            vectors: flat,
            dimension,
        })
    }

    /// Rebuild from a raw buffer, as read back from disk
    pub fn from_raw(
        entries: Vec<Arc<KnowledgeEntry>>,
        vectors: Vec<f32>,
        dimension: usize,
    ) -> Result<Self, DomainError> {
        if vectors.len() != entries.len() * dimension {
            return Err(DomainError::index(format!(
                "Vector buffer holds {} floats, expected {} x {}",
                vectors.len(),
                entries.len(),
                dimension
            )));
        }

        Ok(Self {
            entries,
            vectors,
            dimension,
        })
    }

    pub fn entries(&self) -> &[Arc<KnowledgeEntry>] {
        &self.entries
    }

    pub fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>, DomainError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(DomainError::index(format!(
                "Query vector has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<ScoredEntry> = self
            .entries
            .iter()
            .zip(self.vectors.chunks_exact(self.dimension))
            .map(|(entry, vector)| ScoredEntry::new(entry.clone(), cosine_similarity(query, vector)))
            .collect();

        hits.sort_by(rank_order);
        hits.truncate(k);

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(id: &str) -> Arc<KnowledgeEntry> {
        Arc::new(KnowledgeEntry::new(id, "other", format!("query {}", id), "answer"))
    }

    fn index() -> FlatIndex {
        FlatIndex::new(
            vec![entry("c"), entry("a"), entry("b"), entry("d")],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 2.0, 0.0],
                vec![1.0, 1.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_score_then_id() {
        let hits = index().search(&[0.0, 1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();

        // a and b are both parallel to the query
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_k_and_empty_index() {
        assert!(index().search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert!(FlatIndex::empty().search(&[1.0], 3).unwrap().is_empty());
        assert_eq!(FlatIndex::empty().dimension(), None);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = index().search(&[1.0, 0.0], 2);
        assert!(matches!(result, Err(DomainError::Index { .. })));
    }

    #[test]
    fn test_construction_checks() {
        assert!(FlatIndex::new(vec![entry("a")], vec![]).is_err());
        assert!(FlatIndex::new(vec![entry("a"), entry("b")], vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(FlatIndex::from_raw(vec![entry("a")], vec![1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn test_vector_rows() {
        let index = index();
        assert_eq!(index.vector(3), Some(&[1.0, 1.0, 0.0][..]));
        assert_eq!(index.vector(4), None);
    }

    proptest! {
        #[test]
        fn prop_search_is_idempotent_and_bounded(
            query in prop::collection::vec(-1.0f32..1.0, 3),
            k in 0usize..8,
        ) {
            let index = index();
            let first = index.search(&query, k).unwrap();
            let second = index.search(&query, k).unwrap();

            prop_assert!(first.len() <= k.min(index.len()));

            let first_ids: Vec<&str> = first.iter().map(|h| h.id()).collect();
            let second_ids: Vec<&str> = second.iter().map(|h| h.id()).collect();
            prop_assert_eq!(first_ids, second_ids);

            for pair in first.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
