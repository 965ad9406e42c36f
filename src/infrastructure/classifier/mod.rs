//! Intent classification

mod llm;

pub use llm::{LlmIntentClassifier, DEFAULT_CLASSIFIER_TEMPERATURE};
