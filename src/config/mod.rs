//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, EmbeddingConfig, JudgeConfig, KnowledgeConfig, LlmConfig, LogFormat,
    LoggingConfig, PipelineConfig, ServerConfig,
};
