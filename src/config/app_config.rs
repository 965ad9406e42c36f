use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::{
    BlendWeights, CategorySet, Category, CriteriaSet, DecisionArbiter, DecisionRule, DomainError,
    QualityCriterion, RuleTable,
};
use crate::infrastructure::llm::{RetryPolicy, DEFAULT_OPENAI_BASE_URL};
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::rate_limit::RateLimitConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Generative model access, per-stage models and sampling temperatures
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Falls back to `OPENAI_API_KEY` when empty
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub classifier_model: String,
    #[serde(default = "default_model")]
    pub generator_model: String,
    #[serde(default = "default_model")]
    pub quality_model: String,
    #[serde(default = "default_classifier_temperature")]
    pub classifier_temperature: f32,
    #[serde(default = "default_generator_temperature")]
    pub generator_temperature: f32,
    #[serde(default = "default_quality_temperature")]
    pub quality_temperature: f32,
    /// HTTP client timeout for a single request
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Requested vector size; the model default when unset
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeConfig {
    /// JSONL file of knowledge entries
    #[serde(default = "default_knowledge_path")]
    pub path: String,
    /// Pre-signed URL of a JSONL blob; replaces `path` when set
    #[serde(default)]
    pub blob_url: Option<String>,
    /// Directory holding the persisted vector index
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    /// Extra or replacement generator guidance, keyed by category name
    #[serde(default)]
    pub category_guidance: HashMap<String, String>,
    #[serde(default = "QualityCriterion::defaults")]
    pub criteria: Vec<QualityCriterion>,
    #[serde(default = "default_context_docs_per_check")]
    pub context_docs_per_check: usize,
    #[serde(default = "default_no_context_ceiling")]
    pub no_context_confidence_ceiling: f64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    /// Quality score for the standard accept rule
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Replaces the standard rule table when set
    #[serde(default)]
    pub rules: Option<Vec<DecisionRule>>,
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_classifier_temperature() -> f32 {
    0.3
}

fn default_generator_temperature() -> f32 {
    0.7
}

fn default_quality_temperature() -> f32 {
    0.3
}

fn default_http_timeout_ms() -> u64 {
    60000
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    64
}

fn default_knowledge_path() -> String {
    "data/knowledge_base/faq.jsonl".to_string()
}

fn default_index_dir() -> String {
    "data/vector_db".to_string()
}

fn default_top_k() -> usize {
    3
}

fn default_categories() -> Vec<String> {
    Category::DEFAULTS
        .iter()
        .map(|c| c.as_str().to_string())
        .collect()
}

fn default_context_docs_per_check() -> usize {
    2
}

fn default_no_context_ceiling() -> f64 {
    0.6
}

fn default_threshold() -> f64 {
    70.0
}

fn default_quality_weight() -> f64 {
    0.7
}

fn default_confidence_weight() -> f64 {
    0.3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            classifier_model: default_model(),
            generator_model: default_model(),
            quality_model: default_model(),
            classifier_temperature: default_classifier_temperature(),
            generator_temperature: default_generator_temperature(),
            quality_temperature: default_quality_temperature(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: None,
            cache_capacity: default_cache_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
            blob_url: None,
            index_dir: default_index_dir(),
        }
    }
}

impl KnowledgeConfig {
    /// Configured blob URL, ignoring an empty value
    pub fn blob_url(&self) -> Option<&str> {
        self.blob_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            categories: default_categories(),
            category_guidance: HashMap::new(),
            criteria: QualityCriterion::defaults(),
            context_docs_per_check: default_context_docs_per_check(),
            no_context_confidence_ceiling: default_no_context_ceiling(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            rules: None,
            quality_weight: default_quality_weight(),
            confidence_weight: default_confidence_weight(),
        }
    }
}

impl PipelineConfig {
    pub fn category_set(&self) -> Result<CategorySet, DomainError> {
        CategorySet::from_names(&self.categories)
    }

    pub fn criteria_set(&self) -> Result<CriteriaSet, DomainError> {
        CriteriaSet::new(self.criteria.clone())
    }
}

impl JudgeConfig {
    /// Build the arbiter, validating the rule table and weights
    pub fn arbiter(&self) -> Result<DecisionArbiter, DomainError> {
        let table = match &self.rules {
            Some(rules) => RuleTable::new(rules.clone())?,
            None => RuleTable::standard(self.threshold)?,
        };
        let weights = BlendWeights::new(self.quality_weight, self.confidence_weight)?;

        Ok(DecisionArbiter::new(table, weights))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        if app.llm.api_key.is_empty() {
            app.llm.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        }

        Ok(app)
    }

    /// Reject settings the pipeline cannot start with
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(DomainError::configuration(
                "llm.api_key is empty; set APP__LLM__API_KEY or OPENAI_API_KEY",
            ));
        }

        let ceiling = self.pipeline.no_context_confidence_ceiling;
        if !(0.0..=1.0).contains(&ceiling) {
            return Err(DomainError::configuration(format!(
                "pipeline.no_context_confidence_ceiling must be within [0, 1], got {}",
                ceiling
            )));
        }

        if self.rate_limit.requests == 0 || self.rate_limit.window_seconds == 0 {
            return Err(DomainError::configuration(
                "rate_limit.requests and rate_limit.window_seconds must be positive",
            ));
        }

        if let Some(url) = self.knowledge.blob_url() {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(DomainError::configuration(
                    "knowledge.blob_url must be an http(s) URL",
                ));
            }
        }

        self.pipeline.category_set()?;
        self.pipeline.criteria_set()?;
        self.judge.arbiter()?;

        Ok(())
    }
}
