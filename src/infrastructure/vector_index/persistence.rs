//! On-disk index artifacts: `index.bin` (little-endian f32 rows) plus the
//! `index.meta.json` sidecar

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::FlatIndex;
use crate::domain::knowledge::KnowledgeSet;
use crate::domain::vector_index::{EmbeddingSetup, IndexMetadata, VectorIndex};
use crate::domain::DomainError;

const BLOB_FILE: &str = "index.bin";
const META_FILE: &str = "index.meta.json";

#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn blob_path(&self) -> PathBuf {
        self.dir.join(BLOB_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Write both artifacts, each through a temp file and rename
    pub fn save(
        &self,
        index: &FlatIndex,
        fingerprint: &str,
        embedding: &EmbeddingSetup,
    ) -> Result<(), DomainError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            DomainError::storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let metadata = IndexMetadata {
            entry_count: index.len(),
            content_fingerprint: fingerprint.to_string(),
            dimension: index.dimension().unwrap_or(0),
            ids: index.entries().iter().map(|e| e.id.clone()).collect(),
            embedding: embedding.clone(),
        };
        let meta_json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| DomainError::internal(format!("Failed to encode index metadata: {}", e)))?;

        // Blob first: a sidecar without its blob fails validation on load
        write_atomic(&self.blob_path(), &encode_f32_blob(index.raw_vectors()))?;
        write_atomic(&self.meta_path(), &meta_json)?;

        info!(
            dir = %self.dir.display(),
            entries = metadata.entry_count,
            dimension = metadata.dimension,
            model = %metadata.embedding.model,
            "Persisted vector index"
        );
        Ok(())
    }

    /// Load the persisted index if it was built from `knowledge` with the
    /// same embedding setup
    ///
    /// Returns `Ok(None)` when artifacts are missing, stale or unreadable so
    /// the caller can rebuild.
    pub fn load(
        &self,
        knowledge: &KnowledgeSet,
        embedding: &EmbeddingSetup,
    ) -> Result<Option<FlatIndex>, DomainError> {
        let meta_bytes = match fs::read(self.meta_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "No persisted vector index");
                return Ok(None);
            }
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read index metadata: {}",
                    e
                )))
            }
        };

        let metadata: IndexMetadata = match serde_json::from_slice(&meta_bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Index metadata is corrupt, rebuilding");
                return Ok(None);
            }
        };

        if !metadata.matches(knowledge.len(), knowledge.fingerprint(), &knowledge.ids()) {
            info!(
                persisted_entries = metadata.entry_count,
                current_entries = knowledge.len(),
                "Persisted vector index is stale, rebuilding"
            );
            return Ok(None);
        }

        if !metadata.embedded_with(embedding) {
            info!(
                persisted_model = %metadata.embedding.model,
                current_model = %embedding.model,
                "Persisted vector index was built with another embedding setup, rebuilding"
            );
            return Ok(None);
        }

        let blob = match fs::read(self.blob_path()) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Index blob unreadable, rebuilding");
                return Ok(None);
            }
        };

        let vectors = match decode_f32_blob(&blob) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(error = %e, "Index blob is corrupt, rebuilding");
                return Ok(None);
            }
        };

        match FlatIndex::from_raw(knowledge.entries().to_vec(), vectors, metadata.dimension) {
            Ok(index) => {
                info!(entries = index.len(), "Loaded persisted vector index");
                Ok(Some(index))
            }
            Err(e) => {
                warn!(error = %e, "Index blob does not match metadata, rebuilding");
                Ok(None)
            }
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let tmp = path.with_extension("tmp");
    let io_err = |e: std::io::Error| {
        DomainError::storage(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

pub fn encode_f32_blob(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(values));
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_f32_blob(blob: &[u8]) -> Result<Vec<f32>, DomainError> {
    if blob.len() % 4 != 0 {
        return Err(DomainError::index(format!(
            "Blob length {} is not a multiple of 4",
            blob.len()
        )));
    }

    blob.chunks_exact(4)
        .map(|chunk| {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if value.is_finite() {
                Ok(value)
            } else {
                Err(DomainError::index("Blob contains non-finite values"))
            }
        })
        .collect()
}
