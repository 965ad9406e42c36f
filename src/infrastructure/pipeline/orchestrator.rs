//! Sequences the stages for one query and assembles the result

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::pipeline::{ResultMetadata, StageTiming};
use crate::domain::quality::round2;
use crate::domain::{
    AnswerGenerator, Classification, ContextDocument, ContextRetriever, DecisionArbiter,
    IntentClassifier, PipelineError, PipelineResult, QualityValidator, Query, Stage,
};
use crate::infrastructure::observability::{record_decision, record_failure, record_stage};
use crate::infrastructure::text::truncate_text;

pub const DEFAULT_TOP_K: usize = 3;

/// Classify, optionally retrieve, generate, validate and judge
///
/// Stages run strictly in that order. Retrieval is bypassed entirely when the
/// classifier reports the query needs no context.
#[derive(Clone)]
pub struct Pipeline {
    classifier: Arc<dyn IntentClassifier>,
    retriever: Arc<dyn ContextRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    validator: Arc<dyn QualityValidator>,
    arbiter: DecisionArbiter,
    top_k: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("arbiter", &self.arbiter)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        retriever: Arc<dyn ContextRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        validator: Arc<dyn QualityValidator>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            generator,
            validator,
            arbiter: DecisionArbiter::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_arbiter(mut self, arbiter: DecisionArbiter) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn arbiter(&self) -> &DecisionArbiter {
        &self.arbiter
    }

    /// Sanitize `text` and run every stage
    pub async fn process(&self, text: &str) -> Result<PipelineResult, PipelineError> {
        let query = Query::new(text).map_err(failed)?;
        self.process_query(query).await
    }

    pub async fn process_query(&self, query: Query) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();
        let text = query.text();
        info!(query = %truncate_text(text, 100), "Processing query");

        let mut timings = Vec::with_capacity(5);

        let (classification, timing) =
            timed(Stage::Classification, self.classifier.classify(text)).await;
        timings.push(timing);
        let classification = classification.map_err(failed)?;

        let context = if classification.needs_context {
            let (docs, timing) =
                timed(Stage::Retrieval, self.retriever.retrieve_entries(text, self.top_k)).await;
            timings.push(timing);
            docs.map_err(failed)?
        } else {
            debug!("Query needs no context, skipping retrieval");
            timings.push(StageTiming {
                stage: Stage::Retrieval,
                duration_ms: 0.0,
                executed: false,
            });
            Vec::new()
        };

        let (generated, timing) = timed(
            Stage::Generation,
            self.generator.generate(text, &classification, &context),
        )
        .await;
        timings.push(timing);
        let generated = generated.map_err(failed)?;

        let (quality, timing) = timed(
            Stage::QualityCheck,
            self.validator.check_quality(text, &generated.answer, &context),
        )
        .await;
        timings.push(timing);

        let judge_start = Instant::now();
        let decision = self
            .arbiter
            .judge(quality.overall_score, classification.confidence);
        timings.push(finish(Stage::Judgment, judge_start));
        record_decision(decision.decision);

        let processing_time_ms = round2(start.elapsed().as_secs_f64() * 1000.0);

        info!(
            category = %classification.category,
            retrieved = context.len(),
            overall_score = quality.overall_score,
            decision = %decision.decision,
            processing_time_ms,
            "Query processed"
        );

        Ok(PipelineResult {
            query: text.to_string(),
            retrieved_docs: context.into_iter().map(|doc| doc.text).collect(),
            answer: generated.answer,
            metadata: ResultMetadata {
                sources_used: generated.sources_used,
                generator_confidence: generated.confidence,
                stage_timings: timings,
                completed_at: Utc::now(),
                request: query.metadata().clone(),
            },
            classification,
            quality_checks: quality,
            judge_decision: decision,
            processing_time_ms,
        })
    }

    /// Classification stage alone
    pub async fn classify_only(&self, text: &str) -> Result<Classification, PipelineError> {
        let query = Query::new(text).map_err(failed)?;
        let (classification, _) =
            timed(Stage::Classification, self.classifier.classify(query.text())).await;
        classification.map_err(failed)
    }

    /// Retrieval stage alone, regardless of what the classifier would decide
    pub async fn retrieve_only(&self, text: &str) -> Result<Vec<ContextDocument>, PipelineError> {
        let query = Query::new(text).map_err(failed)?;
        let (docs, _) = timed(
            Stage::Retrieval,
            self.retriever.retrieve_entries(query.text(), self.top_k),
        )
        .await;
        docs.map_err(failed)
    }
}

async fn timed<T, F>(stage: Stage, future: F) -> (T, StageTiming)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let output = future.await;
    (output, finish(stage, start))
}

fn finish(stage: Stage, start: Instant) -> StageTiming {
    let elapsed = start.elapsed();
    record_stage(stage, elapsed);

    let duration_ms = round2(elapsed.as_secs_f64() * 1000.0);
    debug!(stage = %stage, duration_ms, "Stage finished");

    StageTiming {
        stage,
        duration_ms,
        executed: true,
    }
}

fn failed(error: PipelineError) -> PipelineError {
    warn!(stage = ?error.stage(), code = error.code(), error = %error, "Pipeline run aborted");
    record_failure(error.stage());
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::predicate::eq;

    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::knowledge::KnowledgeEntry;
    use crate::domain::pipeline::{
        MockAnswerGenerator, MockContextRetriever, MockIntentClassifier, MockQualityValidator,
    };
    use crate::domain::vector_index::ScoredEntry;
    use crate::domain::{
        Category, DomainError, Disposition, GeneratedAnswer, QualityCheck, QualityCheckResult,
        VectorIndex,
    };
    use crate::infrastructure::embedding::TextEmbedder;
    use crate::infrastructure::retriever::KnowledgeRetriever;
    use crate::infrastructure::vector_index::FlatIndex;

    fn classification(category: Category, confidence: f64, needs_context: bool) -> Classification {
        Classification::new(category, confidence, "test", needs_context).unwrap()
    }

    fn quality(score: f64) -> QualityCheckResult {
        let checks: Vec<QualityCheck> = ["relevance", "completeness", "accuracy", "clarity", "professionalism"]
            .iter()
            .map(|name| QualityCheck::new(*name, score >= 0.7, score, "ok").unwrap())
            .collect();
        QualityCheckResult::from_checks(checks, &[1.0; 5])
    }

    fn docs(n: usize) -> Vec<ContextDocument> {
        (1..=n)
            .map(|i| ContextDocument::new(format!("q00{}", i), format!("Q: question {}\nA: answer {}", i, i)))
            .collect()
    }

    fn classifier_returning(result: Classification) -> MockIntentClassifier {
        let mut classifier = MockIntentClassifier::new();
        classifier
            .expect_classify()
            .times(1)
            .returning(move |_| Ok(result.clone()));
        classifier
    }

    fn generator_returning(confidence: f64, sources: Vec<&str>) -> MockAnswerGenerator {
        let sources: Vec<String> = sources.into_iter().map(String::from).collect();
        let mut generator = MockAnswerGenerator::new();
        generator.expect_generate().times(1).returning(move |_, _, _| {
            Ok(GeneratedAnswer::new("Use the reset link.", sources.clone(), confidence).unwrap())
        });
        generator
    }

    fn validator_returning(score: f64) -> MockQualityValidator {
        let mut validator = MockQualityValidator::new();
        validator
            .expect_check_quality()
            .times(1)
            .returning(move |_, _, _| quality(score));
        validator
    }

    fn pipeline(
        classifier: MockIntentClassifier,
        retriever: impl ContextRetriever + 'static,
        generator: MockAnswerGenerator,
        validator: MockQualityValidator,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(classifier),
            Arc::new(retriever),
            Arc::new(generator),
            Arc::new(validator),
        )
    }

    #[tokio::test]
    async fn test_scenario_password_reset_is_accepted() {
        let mut retriever = MockContextRetriever::new();
        retriever
            .expect_retrieve_entries()
            .with(eq("How do I reset my password?"), eq(3))
            .times(1)
            .returning(|_, _| Ok(docs(3)));

        let pipeline = pipeline(
            classifier_returning(classification(Category::TechnicalSupport, 0.95, true)),
            retriever,
            generator_returning(0.88, vec!["q001"]),
            validator_returning(0.9),
        );

        let result = pipeline.process("How do I reset my password?").await.unwrap();

        assert_eq!(result.classification.category, Category::TechnicalSupport);
        assert_eq!(result.retrieved_docs.len(), 3);
        assert_eq!(result.metadata.generator_confidence, 0.88);
        assert_eq!(result.metadata.sources_used, vec!["q001".to_string()]);
        assert_eq!(result.quality_checks.overall_score, 90.0);
        assert!(result.quality_checks.passed_all);
        assert_eq!(result.judge_decision.decision, Disposition::Accept);
        assert!(result.processing_time_ms >= 0.0);
        assert!(result.metadata.completed_at <= Utc::now());
        assert_eq!(result.metadata.stage_timings.len(), 5);
        assert!(result.timing(Stage::Retrieval).unwrap().executed);
    }

    #[tokio::test]
    async fn test_scenario_low_confidence_goes_to_review() {
        let mut retriever = MockContextRetriever::new();
        retriever.expect_retrieve_entries().returning(|_, _| Ok(docs(2)));

        let pipeline = pipeline(
            classifier_returning(classification(Category::GeneralInquiry, 0.5, true)),
            retriever,
            generator_returning(0.7, vec![]),
            validator_returning(0.55),
        );

        let result = pipeline.process("Tell me about your company").await.unwrap();

        assert_eq!(result.quality_checks.overall_score, 55.0);
        assert_eq!(result.judge_decision.decision, Disposition::ManualReview);
    }

    #[tokio::test]
    async fn test_scenario_poor_quality_is_rejected() {
        let mut retriever = MockContextRetriever::new();
        retriever.expect_retrieve_entries().times(0);

        let pipeline = pipeline(
            classifier_returning(classification(Category::ProductInfo, 0.99, false)),
            retriever,
            generator_returning(0.9, vec![]),
            validator_returning(0.3),
        );

        let result = pipeline.process("What colour is the logo?").await.unwrap();

        assert_eq!(result.judge_decision.decision, Disposition::Reject);
        assert!(result.retrieved_docs.is_empty());
        assert!(!result.timing(Stage::Retrieval).unwrap().executed);
    }

    #[tokio::test]
    async fn test_scenario_empty_knowledge_base_still_answers() {
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let retriever = KnowledgeRetriever::new(
            TextEmbedder::new(provider.clone(), "mock"),
            Arc::new(FlatIndex::empty()),
        );

        let mut generator = MockAnswerGenerator::new();
        generator
            .expect_generate()
            .withf(|_, _, context| context.is_empty())
            .times(1)
            .returning(|_, _, _| Ok(GeneratedAnswer::new("General advice.", vec![], 0.6).unwrap()));

        let pipeline = pipeline(
            classifier_returning(classification(Category::TechnicalSupport, 0.9, true)),
            retriever,
            generator,
            validator_returning(0.8),
        );

        let result = pipeline.process("How do I reset my password?").await.unwrap();

        assert!(result.retrieved_docs.is_empty());
        assert_eq!(result.answer, "General advice.");
        assert_eq!(result.metadata.generator_confidence, 0.6);
    }

    /// Flat index that counts searches
    #[derive(Debug)]
    struct CountingIndex {
        inner: FlatIndex,
        searches: AtomicUsize,
    }

    impl VectorIndex for CountingIndex {
        fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>, DomainError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.inner.search(query, k)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn dimension(&self) -> Option<usize> {
            self.inner.dimension()
        }
    }

    fn counting_setup() -> (Arc<MockEmbeddingProvider>, Arc<CountingIndex>, KnowledgeRetriever) {
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 16));
        let entry = Arc::new(KnowledgeEntry::new("q001", "other", "reset password", "link"));
        let vector = provider.vector_for(&entry.query);
        let index = Arc::new(CountingIndex {
            inner: FlatIndex::new(vec![entry], vec![vector]).unwrap(),
            searches: AtomicUsize::new(0),
        });
        let retriever =
            KnowledgeRetriever::new(TextEmbedder::new(provider.clone(), "mock"), index.clone());
        (provider, index, retriever)
    }

    #[tokio::test]
    async fn test_no_context_skips_embedding_and_search() {
        let (provider, index, retriever) = counting_setup();

        let pipeline = pipeline(
            classifier_returning(classification(Category::Complaint, 0.9, false)),
            retriever,
            generator_returning(0.8, vec![]),
            validator_returning(0.9),
        );

        pipeline.process("Your service is slow").await.unwrap();

        assert_eq!(provider.call_count(), 0);
        assert_eq!(index.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_needs_context_embeds_and_searches_once() {
        let (provider, index, retriever) = counting_setup();

        let pipeline = pipeline(
            classifier_returning(classification(Category::TechnicalSupport, 0.9, true)),
            retriever,
            generator_returning(0.8, vec!["q001"]),
            validator_returning(0.9),
        );

        let result = pipeline.process("reset password").await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(index.searches.load(Ordering::SeqCst), 1);
        assert_eq!(result.retrieved_docs, vec!["Q: reset password\nA: link".to_string()]);
    }

    #[tokio::test]
    async fn test_classification_failure_aborts() {
        let mut classifier = MockIntentClassifier::new();
        classifier.expect_classify().returning(|_| {
            Err(PipelineError::model_output(Stage::Classification, "bad json"))
        });
        let mut generator = MockAnswerGenerator::new();
        generator.expect_generate().times(0);
        let mut validator = MockQualityValidator::new();
        validator.expect_check_quality().times(0);

        let pipeline = pipeline(classifier, MockContextRetriever::new(), generator, validator);
        let error = pipeline.process("hello").await.unwrap_err();

        assert_eq!(error.stage(), Some(Stage::Classification));
    }

    #[tokio::test]
    async fn test_retrieval_failure_aborts() {
        let mut retriever = MockContextRetriever::new();
        retriever
            .expect_retrieve_entries()
            .returning(|_, _| Err(PipelineError::index_unavailable("dimension mismatch")));
        let mut generator = MockAnswerGenerator::new();
        generator.expect_generate().times(0);

        let pipeline = pipeline(
            classifier_returning(classification(Category::TechnicalSupport, 0.9, true)),
            retriever,
            generator,
            MockQualityValidator::new(),
        );

        let error = pipeline.process("reset").await.unwrap_err();
        assert!(matches!(error, PipelineError::IndexUnavailable { .. }));
        assert_eq!(error.stage(), Some(Stage::Retrieval));
    }

    #[tokio::test]
    async fn test_generation_failure_aborts() {
        let mut generator = MockAnswerGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _, _| Err(PipelineError::upstream(Stage::Generation, "503")));
        let mut validator = MockQualityValidator::new();
        validator.expect_check_quality().times(0);

        let pipeline = pipeline(
            classifier_returning(classification(Category::Other, 0.9, false)),
            MockContextRetriever::new(),
            generator,
            validator,
        );

        let error = pipeline.process("hi").await.unwrap_err();
        assert_eq!(error.stage(), Some(Stage::Generation));
    }

    #[tokio::test]
    async fn test_failed_quality_check_does_not_abort() {
        let mut validator = MockQualityValidator::new();
        validator.expect_check_quality().returning(|_, _, _| {
            let checks = vec![
                QualityCheck::new("relevance", true, 0.9, "ok").unwrap(),
                QualityCheck::failed_evaluation("accuracy", "timeout"),
            ];
            QualityCheckResult::from_checks(checks, &[1.0, 1.0])
        });

        let pipeline = pipeline(
            classifier_returning(classification(Category::Other, 0.9, false)),
            MockContextRetriever::new(),
            generator_returning(0.8, vec![]),
            validator,
        );

        let result = pipeline.process("hi").await.unwrap();

        assert!(!result.quality_checks.passed_all);
        assert_eq!(result.quality_checks.overall_score, 45.0);
        assert_eq!(result.judge_decision.decision, Disposition::Reject);
    }

    #[tokio::test]
    async fn test_invalid_query_never_reaches_classifier() {
        let mut classifier = MockIntentClassifier::new();
        classifier.expect_classify().times(0);

        let pipeline = pipeline(
            classifier,
            MockContextRetriever::new(),
            MockAnswerGenerator::new(),
            MockQualityValidator::new(),
        );

        let error = pipeline.process("  <b></b>  ").await.unwrap_err();
        assert!(matches!(error, PipelineError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_metadata_is_carried_through() {
        let pipeline = pipeline(
            classifier_returning(classification(Category::Other, 0.9, false)),
            MockContextRetriever::new(),
            generator_returning(0.8, vec![]),
            validator_returning(0.9),
        );

        let query = Query::new("hello")
            .unwrap()
            .with_metadata([("channel".to_string(), serde_json::json!("web"))].into());
        let result = pipeline.process_query(query).await.unwrap();

        assert_eq!(result.metadata.request["channel"], "web");
    }

    #[tokio::test]
    async fn test_classify_and_retrieve_only() {
        let mut classifier = MockIntentClassifier::new();
        classifier
            .expect_classify()
            .with(eq("billing help"))
            .returning(|_| Ok(classification(Category::BillingQuestion, 0.8, false)));
        let mut retriever = MockContextRetriever::new();
        retriever
            .expect_retrieve_entries()
            .with(eq("billing help"), eq(2))
            .returning(|_, _| Ok(docs(2)));

        let pipeline = pipeline(
            classifier,
            retriever,
            MockAnswerGenerator::new(),
            MockQualityValidator::new(),
        )
        .with_top_k(2);

        let classified = pipeline.classify_only("  billing   help ").await.unwrap();
        assert_eq!(classified.category, Category::BillingQuestion);

        let retrieved = pipeline.retrieve_only("billing <i>help</i>").await.unwrap();
        assert_eq!(retrieved.len(), 2);
    }
}
