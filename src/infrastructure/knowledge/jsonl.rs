//! JSON Lines knowledge source

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::knowledge::{KnowledgeEntry, KnowledgeSet, KnowledgeSource};
use crate::domain::DomainError;

/// Reads `{id, category, query, answer, source}` records, one per line
#[derive(Debug, Clone)]
pub struct JsonlKnowledgeSource {
    path: PathBuf,
}

impl JsonlKnowledgeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Parse JSONL content; blank lines are skipped
pub fn parse_entries(content: &str) -> Result<Vec<KnowledgeEntry>, DomainError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<KnowledgeEntry>(line).map_err(|e| {
                DomainError::configuration(format!(
                    "Invalid knowledge record on line {}: {}",
                    idx + 1,
                    e
                ))
            })
        })
        .collect()
}

#[async_trait]
impl KnowledgeSource for JsonlKnowledgeSource {
    async fn load(&self) -> Result<KnowledgeSet, DomainError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %self.path.display(),
                    "Knowledge base file not found, starting with an empty knowledge base"
                );
                return Ok(KnowledgeSet::empty());
            }
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let set = KnowledgeSet::new(parse_entries(&content)?)?;
        info!(
            path = %self.path.display(),
            entries = set.len(),
            fingerprint = %set.fingerprint(),
            "Loaded knowledge base"
        );

        Ok(set)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
