//! Seams between the orchestrator and its stages

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::PipelineError;
use crate::domain::classification::Classification;
use crate::domain::generation::{ContextDocument, GeneratedAnswer};
use crate::domain::quality::QualityCheckResult;

/// Assigns an intent category to a query
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, PipelineError>;
}

/// Finds knowledge entries relevant to a query
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// At most `k` rendered entries, most similar first
    async fn retrieve_entries(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<ContextDocument>, PipelineError>;
}

/// Drafts an answer from the query and any retrieved context
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        classification: &Classification,
        context: &[ContextDocument],
    ) -> Result<GeneratedAnswer, PipelineError>;
}

/// Scores an answer against the configured criteria
///
/// Never fails: a criterion that cannot be evaluated is recorded as a
/// failed check.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QualityValidator: Send + Sync {
    async fn check_quality(
        &self,
        text: &str,
        answer: &str,
        context: &[ContextDocument],
    ) -> QualityCheckResult;
}
