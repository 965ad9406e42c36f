//! Answer generation

mod llm;

pub use llm::{
    default_category_guidance, LlmAnswerGenerator, DEFAULT_GENERATOR_TEMPERATURE,
    DEFAULT_NO_CONTEXT_CEILING,
};
