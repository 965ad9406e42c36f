//! Generated answers and the context they are grounded on

use serde::{Deserialize, Serialize};

use super::error::ensure_unit_interval;
use super::DomainError;

/// A rendered knowledge entry supplied to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub id: String,
    pub text: String,
}

impl ContextDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Generator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources_used: Vec<String>,
    pub confidence: f64,
}

impl GeneratedAnswer {
    pub fn new(
        answer: impl Into<String>,
        sources_used: Vec<String>,
        confidence: f64,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            answer: answer.into(),
            sources_used,
            confidence: ensure_unit_interval("answer confidence", confidence)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_confidence_range() {
        assert!(GeneratedAnswer::new("ok", vec![], 0.88).is_ok());
        assert!(GeneratedAnswer::new("ok", vec![], 1.2).is_err());
    }
}
