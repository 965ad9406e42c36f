//! Typed structured-output calls
//!
//! A request is sent with a strict JSON schema; the reply is reduced to its
//! JSON object, decoded into the target type and range-checked. A reply that
//! fails any of those steps counts as a retryable failure, so with the
//! default policy a malformed answer gets exactly one more attempt.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::retry::RetryPolicy;
use crate::domain::llm::{LlmJsonSchema, LlmResponseFormat};
use crate::domain::{DomainError, LlmProvider, LlmRequest, LlmResponse, PipelineError, Stage};
use crate::infrastructure::text::{extract_json, truncate_text};

/// A type the model is asked to produce
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Schema name sent with the request
    const SCHEMA_NAME: &'static str;

    /// Strict JSON schema of the expected object
    fn json_schema() -> serde_json::Value;

    /// Checks serde cannot express, e.g. numeric ranges
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Shared client for structured calls with bounded retry
#[derive(Debug, Clone)]
pub struct StructuredCaller {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl StructuredCaller {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Send `request` and decode the reply into `T`
    pub async fn call<T: StructuredOutput>(
        &self,
        stage: Stage,
        model: &str,
        request: LlmRequest,
    ) -> Result<T, PipelineError> {
        let mut request = request;
        request.response_format = Some(LlmResponseFormat::JsonSchema {
            json_schema: LlmJsonSchema::strict(T::SCHEMA_NAME, T::json_schema()),
        });

        let provider = &self.provider;
        let request = &request;

        self.retry
            .run(
                stage.as_str(),
                move || {
                    let request = request.clone();
                    async move {
                        let response = provider.chat(model, request).await?;
                        decode::<T>(&response)
                    }
                },
                |e| e.is_transient() || matches!(e, DomainError::Validation { .. }),
            )
            .await
            .map_err(|e| PipelineError::from_domain(stage, e))
    }
}

/// Decode and validate a model reply
pub fn decode<T: StructuredOutput>(response: &LlmResponse) -> Result<T, DomainError> {
    if response.is_truncated() {
        return Err(DomainError::validation(format!(
            "{} output was truncated",
            T::SCHEMA_NAME
        )));
    }

    let content = response
        .content()
        .ok_or_else(|| DomainError::validation(format!("{} output was empty", T::SCHEMA_NAME)))?;

    let json = extract_json(content).ok_or_else(|| {
        debug!(content = %truncate_text(content, 200), "No JSON object in model output");
        DomainError::validation(format!("{} output contained no JSON object", T::SCHEMA_NAME))
    })?;

    let value: T = serde_json::from_str(json).map_err(|e| {
        debug!(content = %truncate_text(json, 200), "Model output did not match schema");
        DomainError::validation(format!("{} output did not match schema: {}", T::SCHEMA_NAME, e))
    })?;

    value.validate().map_err(|reason| {
        DomainError::validation(format!("{} output out of range: {}", T::SCHEMA_NAME, reason))
    })?;

    Ok(value)
}
