//! Answer quality validation

mod llm;

pub use llm::{LlmQualityValidator, DEFAULT_CONTEXT_DOCS_PER_CHECK, DEFAULT_QUALITY_TEMPERATURE};
