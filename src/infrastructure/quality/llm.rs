//! Model-backed multi-criteria quality validator

use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{
    ContextDocument, CriteriaSet, LlmRequest, PipelineError, QualityCheck, QualityCheckResult,
    QualityCriterion, QualityValidator, Stage,
};
use crate::infrastructure::llm::{StructuredCaller, StructuredOutput};

pub const DEFAULT_QUALITY_TEMPERATURE: f32 = 0.3;

/// Context documents shown to each evaluation
pub const DEFAULT_CONTEXT_DOCS_PER_CHECK: usize = 2;

#[derive(Debug, Deserialize)]
struct CheckOutput {
    passed: bool,
    score: f64,
    explanation: String,
}

impl StructuredOutput for CheckOutput {
    const SCHEMA_NAME: &'static str = "quality_check";

    fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "passed": {"type": "boolean"},
                "score": {"type": "number"},
                "explanation": {"type": "string"}
            },
            "required": ["passed", "score", "explanation"],
            "additionalProperties": false
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.score.is_finite() && (0.0..=1.0).contains(&self.score) {
            Ok(())
        } else {
            Err(format!("score {} outside [0, 1]", self.score))
        }
    }
}

/// Evaluates every configured criterion concurrently
#[derive(Debug, Clone)]
pub struct LlmQualityValidator {
    caller: StructuredCaller,
    model: String,
    criteria: CriteriaSet,
    temperature: f32,
    context_docs: usize,
}

impl LlmQualityValidator {
    pub fn new(caller: StructuredCaller, model: impl Into<String>) -> Self {
        Self {
            caller,
            model: model.into(),
            criteria: CriteriaSet::default(),
            temperature: DEFAULT_QUALITY_TEMPERATURE,
            context_docs: DEFAULT_CONTEXT_DOCS_PER_CHECK,
        }
    }

    pub fn with_criteria(mut self, criteria: CriteriaSet) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context_docs(mut self, context_docs: usize) -> Self {
        self.context_docs = context_docs;
        self
    }

    fn request(&self, criterion: &QualityCriterion, user_prompt: &str) -> LlmRequest {
        LlmRequest::builder()
            .system(format!(
                "You are a quality evaluator.\n\n\
                 Evaluate the answer based on: {}\n\n\
                 Return JSON:\n\
                 - passed: boolean\n\
                 - explanation: brief explanation (1-2 sentences)\n\
                 - score: float 0.0-1.0",
                criterion.description
            ))
            .user(user_prompt)
            .temperature(self.temperature)
            .build()
    }

    async fn evaluate(&self, criterion: &QualityCriterion, user_prompt: &str) -> QualityCheck {
        let request = self.request(criterion, user_prompt);
        let outcome = self
            .caller
            .call::<CheckOutput>(Stage::QualityCheck, &self.model, request)
            .await
            .and_then(|output| {
                QualityCheck::new(&criterion.name, output.passed, output.score, output.explanation)
                    .map_err(|e| PipelineError::from_domain(Stage::QualityCheck, e))
            });

        match outcome {
            Ok(check) => check,
            Err(e) => {
                warn!(criterion = %criterion.name, error = %e, "Criterion could not be evaluated");
                QualityCheck::failed_evaluation(&criterion.name, e)
            }
        }
    }
}

fn user_prompt(text: &str, answer: &str, context: &[ContextDocument], limit: usize) -> String {
    let context: Vec<&str> = context.iter().take(limit).map(|doc| doc.text.as_str()).collect();

    format!(
        "Query: {}\n\nAnswer: {}\n\nContext Used:\n{}\n\nEvaluate the answer quality.",
        text,
        answer,
        context.join("\n")
    )
}

#[async_trait]
impl QualityValidator for LlmQualityValidator {
    async fn check_quality(
        &self,
        text: &str,
        answer: &str,
        context: &[ContextDocument],
    ) -> QualityCheckResult {
        let start = Instant::now();
        let prompt = user_prompt(text, answer, context, self.context_docs);

        // join_all yields results in input order
        let checks = join_all(
            self.criteria
                .criteria()
                .iter()
                .map(|criterion| self.evaluate(criterion, &prompt)),
        )
        .await;

        let result = self.criteria.aggregate(checks);

        info!(
            overall_score = result.overall_score,
            passed_all = result.passed_all,
            failed = result.failed().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Quality checked"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::llm::{LlmResponse, Message, MockLlmProvider};
    use crate::domain::{DomainError, LlmProvider};
    use crate::infrastructure::llm::RetryPolicy;

    fn caller(provider: Arc<dyn LlmProvider>) -> StructuredCaller {
        StructuredCaller::new(provider, RetryPolicy::default().with_initial_delay(1))
    }

    /// Fails every evaluation whose system prompt mentions `failing`
    #[derive(Debug)]
    struct SelectiveProvider {
        failing: &'static str,
    }

    #[async_trait]
    impl LlmProvider for SelectiveProvider {
        async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
            if request.messages[0].content.contains(self.failing) {
                return Err(DomainError::provider("selective", "upstream unavailable"));
            }
            let reply = json!({"passed": true, "score": 0.8, "explanation": "Fine"});
            Ok(LlmResponse::new("r", model, Message::assistant(reply.to_string())))
        }

        fn provider_name(&self) -> &'static str {
            "selective"
        }
    }

    /// Scores each criterion by description keyword, later criteria first
    #[derive(Debug)]
    struct StaggeredProvider {
        plan: Vec<(&'static str, f64, u64)>,
        finished: std::sync::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LlmProvider for StaggeredProvider {
        async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
            let system = request.messages[0].content.clone();
            let (keyword, score, delay_ms) = self
                .plan
                .iter()
                .copied()
                .find(|(keyword, _, _)| system.contains(keyword))
                .ok_or_else(|| DomainError::provider("staggered", "unplanned criterion"))?;

            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            self.finished.lock().unwrap().push(keyword);

            let reply = json!({"passed": score >= 0.5, "score": score, "explanation": keyword});
            Ok(LlmResponse::new("r", model, Message::assistant(reply.to_string())))
        }

        fn provider_name(&self) -> &'static str {
            "staggered"
        }
    }

    fn docs() -> Vec<ContextDocument> {
        vec![
            ContextDocument::new("q1", "Q: first\nA: one"),
            ContextDocument::new("q2", "Q: second\nA: two"),
            ContextDocument::new("q3", "Q: third\nA: three"),
        ]
    }

    #[tokio::test]
    async fn test_all_criteria_pass() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_json(json!({
            "passed": true,
            "score": 0.9,
            "explanation": "Good"
        })));
        let validator = LlmQualityValidator::new(caller(provider.clone()), "gpt-4o-mini");

        let result = validator.check_quality("q", "a", &docs()).await;

        assert_eq!(result.checks.len(), 5);
        assert_eq!(result.overall_score, 90.0);
        assert!(result.passed_all);
        assert_eq!(provider.call_count(), 5);

        let names: Vec<&str> = result.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["relevance", "completeness", "accuracy", "clarity", "professionalism"]
        );
    }

    #[tokio::test]
    async fn test_only_first_documents_are_shown() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_json(json!({
            "passed": true,
            "score": 1.0,
            "explanation": "Good"
        })));
        let validator = LlmQualityValidator::new(caller(provider.clone()), "m");

        validator.check_quality("q", "a", &docs()).await;

        let prompt = &provider.requests()[0].messages[1].content;
        assert!(prompt.contains("Q: first"));
        assert!(prompt.contains("Q: second"));
        assert!(!prompt.contains("Q: third"));
    }

    #[tokio::test]
    async fn test_failed_criterion_is_absorbed() {
        let provider = Arc::new(SelectiveProvider { failing: "factually" });
        let validator = LlmQualityValidator::new(caller(provider), "m");

        let result = validator.check_quality("q", "a", &docs()).await;

        assert_eq!(result.checks.len(), 5);
        assert!(!result.passed_all);

        let accuracy = &result.checks[2];
        assert_eq!(accuracy.name, "accuracy");
        assert!(!accuracy.passed);
        assert_eq!(accuracy.score, 0.0);
        assert!(accuracy.explanation.starts_with("Evaluation failed:"));

        // (0.8 * 4 + 0) / 5
        assert_eq!(result.overall_score, 64.0);
    }

    #[tokio::test]
    async fn test_weighted_criteria() {
        let provider = Arc::new(SelectiveProvider { failing: "tone" });
        let criteria = CriteriaSet::new(vec![
            QualityCriterion::new("relevance", "Does it answer the question?").with_weight(3.0),
            QualityCriterion::new("tone", "Is the tone right?"),
        ])
        .unwrap();
        let validator = LlmQualityValidator::new(caller(provider), "m").with_criteria(criteria);

        let result = validator.check_quality("q", "a", &[]).await;

        // (0.8 * 3 + 0 * 1) / 4
        assert_eq!(result.overall_score, 60.0);
    }

    #[tokio::test]
    async fn test_out_of_order_completion_keeps_scores_with_criteria() {
        let provider = Arc::new(StaggeredProvider {
            plan: vec![("alpha", 0.2, 80), ("beta", 0.5, 40), ("gamma", 0.9, 0)],
            finished: std::sync::Mutex::new(Vec::new()),
        });
        let criteria = CriteriaSet::new(vec![
            QualityCriterion::new("first", "alpha"),
            QualityCriterion::new("second", "beta").with_weight(2.0),
            QualityCriterion::new("third", "gamma").with_weight(3.0),
        ])
        .unwrap();
        let validator =
            LlmQualityValidator::new(caller(provider.clone()), "m").with_criteria(criteria);

        let result = validator.check_quality("q", "a", &[]).await;

        assert_eq!(*provider.finished.lock().unwrap(), vec!["gamma", "beta", "alpha"]);

        let summary: Vec<(&str, f64, &str)> = result
            .checks
            .iter()
            .map(|c| (c.name.as_str(), c.score, c.explanation.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("first", 0.2, "alpha"), ("second", 0.5, "beta"), ("third", 0.9, "gamma")]
        );
        assert!(!result.passed_all);

        // (0.2 * 1 + 0.5 * 2 + 0.9 * 3) / 6
        assert_eq!(result.overall_score, 65.0);
    }
}
