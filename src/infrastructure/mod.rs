//! Infrastructure layer - Model clients, storage and stage implementations

pub mod classifier;
pub mod embedding;
pub mod generator;
pub mod knowledge;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod quality;
pub mod rate_limit;
pub mod retriever;
pub mod text;
pub mod vector_index;
