//! Model-backed intent classifier

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{
    Category, CategorySet, Classification, IntentClassifier, LlmRequest, PipelineError, Stage,
};
use crate::infrastructure::llm::{StructuredCaller, StructuredOutput};
use crate::infrastructure::text::truncate_text;

pub const DEFAULT_CLASSIFIER_TEMPERATURE: f32 = 0.3;

/// Raw classifier reply before the category is resolved
#[derive(Debug, Deserialize)]
struct ClassificationOutput {
    category: String,
    confidence: f64,
    reasoning: String,
    needs_context: bool,
}

impl StructuredOutput for ClassificationOutput {
    const SCHEMA_NAME: &'static str = "classification";

    fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "category": {"type": "string"},
                "confidence": {"type": "number"},
                "reasoning": {"type": "string"},
                "needs_context": {"type": "boolean"}
            },
            "required": ["category", "confidence", "reasoning", "needs_context"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence) {
            Ok(())
        } else {
            Err(format!("confidence {} outside [0, 1]", self.confidence))
        }
    }
}

/// Classifies queries with one structured-output call
#[derive(Debug, Clone)]
pub struct LlmIntentClassifier {
    caller: StructuredCaller,
    model: String,
    categories: CategorySet,
    temperature: f32,
}

impl LlmIntentClassifier {
    pub fn new(caller: StructuredCaller, model: impl Into<String>) -> Self {
        Self {
            caller,
            model: model.into(),
            categories: CategorySet::default(),
            temperature: DEFAULT_CLASSIFIER_TEMPERATURE,
        }
    }

    pub fn with_categories(mut self, categories: CategorySet) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a query classification system.\n\n\
             Categories: {}\n\n\
             Analyze the query and return:\n\
             - category: one of the defined categories\n\
             - confidence: float between 0.0 and 1.0\n\
             - reasoning: brief explanation (1-2 sentences)\n\
             - needs_context: boolean - does this query require knowledge retrieval?\n\n\
             Return valid JSON only.",
            self.categories.names().join(", ")
        )
    }

    /// Map the raw reply onto the configured set
    fn resolve(&self, output: ClassificationOutput) -> Result<Classification, PipelineError> {
        let (category, needs_context) = match self.categories.resolve(&output.category) {
            Some(category) => (category, output.needs_context),
            None => {
                warn!(
                    category = %output.category,
                    "Classifier returned unknown category, falling back to other"
                );
                (Category::Other, true)
            }
        };

        Classification::new(category, output.confidence, output.reasoning, needs_context)
            .map_err(|e| PipelineError::from_domain(Stage::Classification, e))
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, PipelineError> {
        let start = Instant::now();
        debug!(query = %truncate_text(text, 100), "Classifying query");

        let request = LlmRequest::builder()
            .system(self.system_prompt())
            .user(format!("Query: {}", text))
            .temperature(self.temperature)
            .build();

        let output: ClassificationOutput = self
            .caller
            .call(Stage::Classification, &self.model, request)
            .await?;
        let classification = self.resolve(output)?;

        info!(
            category = %classification.category,
            confidence = classification.confidence,
            needs_context = classification.needs_context,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query classified"
        );

        Ok(classification)
    }
}
