//! Swappable index snapshot shared across requests

use std::sync::{Arc, RwLock};

use tracing::info;

use super::FlatIndex;
use crate::domain::vector_index::{ScoredEntry, VectorIndex};
use crate::domain::DomainError;

/// Readers clone the current `Arc` under a short read lock and search it
/// without holding the lock; a rebuild replaces the pointer in one write.
#[derive(Debug, Default)]
pub struct SharedVectorIndex {
    current: RwLock<Arc<FlatIndex>>,
}

impl SharedVectorIndex {
    pub fn new(index: FlatIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Result<Arc<FlatIndex>, DomainError> {
        self.current
            .read()
            .map(|guard| guard.clone())
            .map_err(|e| DomainError::index(format!("Index lock poisoned: {}", e)))
    }

    /// Publish a fully built index
    pub fn swap(&self, index: FlatIndex) -> Result<(), DomainError> {
        let next = Arc::new(index);
        let entries = next.len();

        let mut guard = self
            .current
            .write()
            .map_err(|e| DomainError::index(format!("Index lock poisoned: {}", e)))?;
        *guard = next;
        drop(guard);

        info!(entries, "Swapped in rebuilt vector index");
        Ok(())
    }
}

impl VectorIndex for SharedVectorIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>, DomainError> {
        self.snapshot()?.search(query, k)
    }

    fn len(&self) -> usize {
        self.snapshot().map(|s| s.len()).unwrap_or(0)
    }

    fn dimension(&self) -> Option<usize> {
        self.snapshot().ok().and_then(|s| s.dimension())
    }
}
