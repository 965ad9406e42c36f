//! Answer Pipeline
//!
//! Customer-query answering service: classify intent, retrieve supporting
//! knowledge entries when the query needs them, generate a grounded answer,
//! validate it against quality criteria and arbitrate a final disposition.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use api::AppState;
use domain::{DomainError, KnowledgeSet, KnowledgeSource, LlmProvider, VectorIndex};
use infrastructure::classifier::LlmIntentClassifier;
use infrastructure::embedding::{OpenAiEmbeddingProvider, TextEmbedder};
use infrastructure::generator::LlmAnswerGenerator;
use infrastructure::knowledge::{BlobKnowledgeSource, JsonlKnowledgeSource};
use infrastructure::llm::{HttpClient, OpenAiProvider, StructuredCaller};
use infrastructure::pipeline::Pipeline;
use infrastructure::quality::LlmQualityValidator;
use infrastructure::rate_limit::{RateLimitConfig, RateLimiter};
use infrastructure::retriever::KnowledgeRetriever;
use infrastructure::vector_index::{IndexBuilder, IndexStore, SharedVectorIndex};

/// Everything a process needs to answer queries
///
/// The shared index starts empty; call [`PipelineContext::load_index`] or
/// [`PipelineContext::rebuild_index`] before serving retrieval.
#[derive(Debug)]
pub struct PipelineContext {
    pub pipeline: Arc<Pipeline>,
    pub index: Arc<SharedVectorIndex>,
    pub knowledge: KnowledgeSet,
    index_builder: IndexBuilder,
}

impl PipelineContext {
    /// Wire providers and stages from configuration
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let http = HttpClient::with_timeout(Duration::from_millis(config.llm.timeout_ms))?;
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
            http.clone(),
            &config.llm.api_key,
            &config.llm.base_url,
        ));
        let embeddings = Arc::new(OpenAiEmbeddingProvider::with_base_url(
            http,
            &config.llm.api_key,
            &config.llm.base_url,
        ));

        let retry = config.pipeline.retry.clone();
        let caller = StructuredCaller::new(llm, retry.clone());

        let embedder = TextEmbedder::new(embeddings, &config.embedding.model)
            .with_dimensions(config.embedding.dimensions)
            .with_retry(retry)
            .with_cache_capacity(config.embedding.cache_capacity)
            .with_batch_size(config.embedding.batch_size);

        let source: Box<dyn KnowledgeSource> = match config.knowledge.blob_url() {
            Some(url) => Box::new(BlobKnowledgeSource::new(
                url,
                Duration::from_millis(config.llm.timeout_ms),
            )?),
            None => Box::new(JsonlKnowledgeSource::new(&config.knowledge.path)),
        };
        let knowledge = source.load().await?;
        let index = Arc::new(SharedVectorIndex::default());
        let index_builder = IndexBuilder::new(embedder.clone())
            .with_store(IndexStore::new(&config.knowledge.index_dir));

        let classifier = LlmIntentClassifier::new(caller.clone(), &config.llm.classifier_model)
            .with_categories(config.pipeline.category_set()?)
            .with_temperature(config.llm.classifier_temperature);

        let retriever = KnowledgeRetriever::new(embedder, index.clone() as Arc<dyn VectorIndex>);

        let generator = LlmAnswerGenerator::new(caller.clone(), &config.llm.generator_model)
            .with_temperature(config.llm.generator_temperature)
            .with_guidance(config.pipeline.category_guidance.clone())
            .with_no_context_ceiling(config.pipeline.no_context_confidence_ceiling);

        let validator = LlmQualityValidator::new(caller, &config.llm.quality_model)
            .with_criteria(config.pipeline.criteria_set()?)
            .with_temperature(config.llm.quality_temperature)
            .with_context_docs(config.pipeline.context_docs_per_check);

        let pipeline = Pipeline::new(
            Arc::new(classifier),
            Arc::new(retriever),
            Arc::new(generator),
            Arc::new(validator),
        )
        .with_arbiter(config.judge.arbiter()?)
        .with_top_k(config.pipeline.top_k);

        info!(
            knowledge_source = %source.describe(),
            knowledge_entries = knowledge.len(),
            top_k = config.pipeline.top_k,
            classifier_model = %config.llm.classifier_model,
            generator_model = %config.llm.generator_model,
            quality_model = %config.llm.quality_model,
            "Pipeline assembled"
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            index,
            knowledge,
            index_builder,
        })
    }

    /// Reuse the persisted index when it still matches, else build it
    pub async fn load_index(&self) -> Result<usize, DomainError> {
        let index = self.index_builder.load_or_build(&self.knowledge).await?;
        self.index.swap(index)?;
        Ok(self.index.len())
    }

    /// Re-embed every entry and overwrite the persisted index
    pub async fn rebuild_index(&self) -> Result<usize, DomainError> {
        self.index_builder
            .rebuild_into(&self.index, &self.knowledge)
            .await?;
        Ok(self.index.len())
    }

    pub fn app_state(&self, rate_limit: &RateLimitConfig) -> AppState {
        AppState::new(
            self.pipeline.clone(),
            self.index.clone(),
            Arc::new(RateLimiter::new(rate_limit)),
        )
    }
}
