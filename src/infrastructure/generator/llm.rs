//! Model-backed answer generator

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{
    AnswerGenerator, Classification, ContextDocument, GeneratedAnswer, LlmRequest, PipelineError,
    Stage,
};
use crate::infrastructure::llm::{StructuredCaller, StructuredOutput};

pub const DEFAULT_GENERATOR_TEMPERATURE: f32 = 0.7;

/// Confidence cap for answers drafted without retrieved context
pub const DEFAULT_NO_CONTEXT_CEILING: f64 = 0.6;

/// Built-in per-category instructions, keyed by category name
pub fn default_category_guidance() -> HashMap<String, String> {
    [
        (
            "general_inquiry",
            "Answer directly and point to where the user can learn more.",
        ),
        (
            "technical_support",
            "Give numbered, step-by-step instructions and mention what to do if a step fails.",
        ),
        (
            "billing_question",
            "Be precise about amounts, dates and account settings; never guess at figures.",
        ),
        (
            "product_info",
            "Describe features and differences between offerings factually.",
        ),
        (
            "complaint",
            "Acknowledge the problem with empathy before offering a concrete next step.",
        ),
    ]
    .into_iter()
    .map(|(category, text)| (category.to_string(), text.to_string()))
    .collect()
}

#[derive(Debug, Deserialize)]
struct AnswerOutput {
    answer: String,
    sources_used: Vec<String>,
    confidence: f64,
}

impl StructuredOutput for AnswerOutput {
    const SCHEMA_NAME: &'static str = "generated_answer";

    fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "sources_used": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"}
            },
            "required": ["answer", "sources_used", "confidence"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.answer.trim().is_empty() {
            return Err("answer is empty".to_string());
        }
        if !(self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

/// Drafts answers with one structured-output call
#[derive(Debug, Clone)]
pub struct LlmAnswerGenerator {
    caller: StructuredCaller,
    model: String,
    temperature: f32,
    guidance: HashMap<String, String>,
    no_context_ceiling: f64,
}

impl LlmAnswerGenerator {
    pub fn new(caller: StructuredCaller, model: impl Into<String>) -> Self {
        Self {
            caller,
            model: model.into(),
            temperature: DEFAULT_GENERATOR_TEMPERATURE,
            guidance: default_category_guidance(),
            no_context_ceiling: DEFAULT_NO_CONTEXT_CEILING,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Overrides or extends the built-in guidance
    pub fn with_guidance(mut self, guidance: HashMap<String, String>) -> Self {
        self.guidance.extend(guidance);
        self
    }

    pub fn with_no_context_ceiling(mut self, ceiling: f64) -> Self {
        self.no_context_ceiling = ceiling.clamp(0.0, 1.0);
        self
    }

    fn system_prompt(&self, classification: &Classification) -> String {
        let mut prompt = format!(
            "You are a helpful assistant.\n\n\
             Guidelines:\n\
             - Be clear, concise, and professional\n\
             - Use the provided context when available\n\
             - If context doesn't fully answer the question, acknowledge limitations\n\
             - Maintain a friendly tone\n\n\
             Category: {}\n\
             Confidence: {:.2}\n",
            classification.category, classification.confidence
        );

        if let Some(guidance) = self.guidance.get(classification.category.as_str()) {
            prompt.push_str(&format!("Category guidance: {}\n", guidance));
        }

        prompt.push_str(
            "\nReturn valid JSON with:\n\
             - answer: your response\n\
             - sources_used: list of document ids used (empty if none)\n\
             - confidence: float 0.0-1.0 indicating your certainty",
        );
        prompt
    }

    fn user_prompt(text: &str, context: &[ContextDocument]) -> String {
        if context.is_empty() {
            return format!(
                "User Query: {}\n\nProvide a helpful response based on your general knowledge.",
                text
            );
        }

        let blocks: Vec<String> = context
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("[Doc {}] (id: {})\n{}", i + 1, doc.id, doc.text))
            .collect();

        format!(
            "Context from knowledge base:\n\n{}\n\nUser Query: {}\n\n\
             Based on the context above, provide a helpful response.",
            blocks.join("\n\n"),
            text
        )
    }

    /// Keep only cited ids that were supplied, and cap ungrounded confidence
    fn ground(&self, output: AnswerOutput, context: &[ContextDocument]) -> (Vec<String>, f64) {
        let mut sources: Vec<String> = Vec::new();
        for id in output.sources_used {
            if !context.iter().any(|doc| doc.id == id) {
                warn!(source = %id, "Generator cited a document it was not given");
                continue;
            }
            if !sources.contains(&id) {
                sources.push(id);
            }
        }

        let confidence = if context.is_empty() {
            output.confidence.min(self.no_context_ceiling)
        } else {
            output.confidence
        };

        (sources, confidence)
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(
        &self,
        text: &str,
        classification: &Classification,
        context: &[ContextDocument],
    ) -> Result<GeneratedAnswer, PipelineError> {
        let start = Instant::now();
        debug!(
            category = %classification.category,
            context_docs = context.len(),
            "Generating answer"
        );

        let request = LlmRequest::builder()
            .system(self.system_prompt(classification))
            .user(Self::user_prompt(text, context))
            .temperature(self.temperature)
            .build();

        let output: AnswerOutput = self
            .caller
            .call(Stage::Generation, &self.model, request)
            .await?;
        let answer = output.answer.clone();
        let (sources, confidence) = self.ground(output, context);

        let generated = GeneratedAnswer::new(answer, sources, confidence)
            .map_err(|e| PipelineError::from_domain(Stage::Generation, e))?;

        info!(
            sources = generated.sources_used.len(),
            confidence = generated.confidence,
            grounded = !context.is_empty(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Answer generated"
        );

        Ok(generated)
    }
}
