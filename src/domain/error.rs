use thiserror::Error;

/// Core domain errors raised by providers, stores and value constructors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Timeout: {provider} did not respond within {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Index error: {message}")]
    Index { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn timeout(provider: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            provider: provider.into(),
            timeout_ms,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
        }
    }

    /// Whether a repeated attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Timeout { .. })
    }
}

/// Validate that a value lies in the closed unit interval
pub fn ensure_unit_interval(field: &str, value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DomainError::validation(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout("openai", 30000);
        assert_eq!(
            error.to_string(),
            "Timeout: openai did not respond within 30000ms"
        );
        assert!(error.is_transient());
    }

    #[test]
    fn test_configuration_is_not_transient() {
        assert!(!DomainError::configuration("missing key").is_transient());
        assert!(DomainError::provider("http", "503").is_transient());
    }

    #[test]
    fn test_ensure_unit_interval() {
        assert_eq!(ensure_unit_interval("confidence", 0.0).unwrap(), 0.0);
        assert_eq!(ensure_unit_interval("confidence", 1.0).unwrap(), 1.0);
        assert!(ensure_unit_interval("confidence", 1.01).is_err());
        assert!(ensure_unit_interval("confidence", -0.1).is_err());
        assert!(ensure_unit_interval("confidence", f64::NAN).is_err());
    }
}
