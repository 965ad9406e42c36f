//! Embedding-based context retrieval

mod knowledge;

pub use knowledge::KnowledgeRetriever;
