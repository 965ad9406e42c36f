use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Retrieval,
    Generation,
    QualityCheck,
    Judgment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classification => "classification",
            Stage::Retrieval => "retrieval",
            Stage::Generation => "generation",
            Stage::QualityCheck => "quality_check",
            Stage::Judgment => "judgment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{stage}: model output rejected: {message}")]
    ModelOutput { stage: Stage, message: String },

    #[error("{stage}: upstream did not respond within {timeout_ms}ms")]
    UpstreamTimeout { stage: Stage, timeout_ms: u64 },

    #[error("{stage}: upstream failure: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("retrieval: index unavailable: {message}")]
    IndexUnavailable { message: String },
}

impl PipelineError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn model_output(stage: Stage, message: impl Into<String>) -> Self {
        Self::ModelOutput {
            stage,
            message: message.into(),
        }
    }

    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            message: message.into(),
        }
    }

    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Attribute a domain error to a stage
    pub fn from_domain(stage: Stage, error: DomainError) -> Self {
        match error {
            DomainError::Timeout { timeout_ms, .. } => Self::UpstreamTimeout { stage, timeout_ms },
            DomainError::Validation { message } => Self::ModelOutput { stage, message },
            DomainError::Index { message } => Self::IndexUnavailable { message },
            DomainError::Configuration { message } => Self::Configuration { message },
            DomainError::Provider { provider, message } => Self::Upstream {
                stage,
                message: format!("{}: {}", provider, message),
            },
            DomainError::Internal { message } | DomainError::Storage { message } => {
                Self::Upstream { stage, message }
            }
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ModelOutput { stage, .. }
            | Self::UpstreamTimeout { stage, .. }
            | Self::Upstream { stage, .. } => Some(*stage),
            Self::IndexUnavailable { .. } => Some(Stage::Retrieval),
            Self::InvalidQuery { .. } | Self::Configuration { .. } => None,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "invalid_query",
            Self::Configuration { .. } => "configuration_error",
            Self::ModelOutput { .. } => "model_output_invalid",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::Upstream { .. } => "upstream_error",
            Self::IndexUnavailable { .. } => "index_unavailable",
        }
    }
}
