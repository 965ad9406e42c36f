//! Domain layer - Core pipeline entities, contracts and pure policies

pub mod classification;
pub mod decision;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod quality;
pub mod vector_index;

pub use classification::{Category, CategorySet, Classification};
pub use decision::{BlendWeights, Decision, DecisionArbiter, DecisionRule, Disposition, RuleTable};
pub use embedding::{cosine_similarity, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::DomainError;
pub use generation::{ContextDocument, GeneratedAnswer};
pub use knowledge::{KnowledgeEntry, KnowledgeSet, KnowledgeSource};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole};
pub use pipeline::{
    AnswerGenerator, ContextRetriever, IntentClassifier, PipelineError, PipelineResult,
    QualityValidator, Query, Stage,
};
pub use quality::{CriteriaSet, QualityCheck, QualityCheckResult, QualityCriterion};
pub use vector_index::{EmbeddingSetup, IndexMetadata, ScoredEntry, VectorIndex};
