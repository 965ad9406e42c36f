use async_trait::async_trait;
use std::fmt::Debug;

use super::KnowledgeSet;
use crate::domain::DomainError;

/// Where the knowledge entries come from
#[async_trait]
pub trait KnowledgeSource: Send + Sync + Debug {
    /// Load the full entry set
    async fn load(&self) -> Result<KnowledgeSet, DomainError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}
