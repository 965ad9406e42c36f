//! Pipeline stage contracts, query and result types

mod error;
mod query;
mod result;
mod stages;

pub use error::{PipelineError, Stage};
pub use query::{sanitize_input, Query, MAX_QUERY_CHARS};
pub use result::{PipelineResult, ResultMetadata, StageTiming};
pub use stages::{AnswerGenerator, ContextRetriever, IntentClassifier, QualityValidator};

#[cfg(test)]
pub use stages::{
    MockAnswerGenerator, MockContextRetriever, MockIntentClassifier, MockQualityValidator,
};
