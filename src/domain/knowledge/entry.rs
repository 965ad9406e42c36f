//! Knowledge entries and the immutable set loaded at startup

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// A curated question/answer pair the retriever can surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub category: String,
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub source: String,
}

impl KnowledgeEntry {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        query: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            query: query.into(),
            answer: answer.into(),
            source: String::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Text form handed to the generator as a context document
    pub fn render(&self) -> String {
        format!("Q: {}\nA: {}", self.query, self.answer)
    }
}

/// Entries loaded once per process, in source order
#[derive(Debug, Clone)]
pub struct KnowledgeSet {
    entries: Vec<Arc<KnowledgeEntry>>,
    fingerprint: String,
}

impl KnowledgeSet {
    /// Build a set, rejecting empty or duplicate ids
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(DomainError::configuration(
                    "Knowledge entry with an empty id",
                ));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(DomainError::configuration(format!(
                    "Duplicate knowledge entry id '{}'",
                    entry.id
                )));
            }
        }

        let fingerprint = fingerprint(&entries)?;

        Ok(Self {
            entries: entries.into_iter().map(Arc::new).collect(),
            fingerprint,
        })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            fingerprint: hex::encode(Sha256::digest(b"")),
        }
    }

    pub fn entries(&self) -> &[Arc<KnowledgeEntry>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Arc<KnowledgeEntry>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 over the records sorted by id, one JSON object per line
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(entries: &[KnowledgeEntry]) -> Result<String, DomainError> {
    let mut sorted: Vec<&KnowledgeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for entry in sorted {
        let line = serde_json::to_string(entry)
            .map_err(|e| DomainError::internal(format!("Failed to encode entry: {}", e)))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    Ok(hex::encode(hasher.finalize()))
}
