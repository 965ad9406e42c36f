use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PipelineError;

pub const MAX_QUERY_CHARS: usize = 1000;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip HTML tags and collapse runs of whitespace
pub fn sanitize_input(text: &str) -> String {
    let stripped = HTML_TAG.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// A sanitized user query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, serde_json::Value>,
}

impl Query {
    /// Sanitize and validate; the result holds 1..=1000 characters
    pub fn new(raw: &str) -> Result<Self, PipelineError> {
        let text = sanitize_input(raw);
        let chars = text.chars().count();

        if chars == 0 {
            return Err(PipelineError::invalid_query("Query text must not be empty"));
        }
        if chars > MAX_QUERY_CHARS {
            return Err(PipelineError::invalid_query(format!(
                "Query text must be at most {} characters, got {}",
                MAX_QUERY_CHARS, chars
            )));
        }

        Ok(Self {
            text,
            metadata: HashMap::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_input() {
        assert_eq!(
            sanitize_input("  <b>How</b> do   I\n reset <i>my</i> password?  "),
            "How do I reset my password?"
        );
        assert_eq!(sanitize_input("<script></script>"), "");
    }

    #[test]
    fn test_query_bounds() {
        assert!(Query::new("   ").is_err());
        assert!(Query::new("<p></p>").is_err());
        assert!(Query::new(&"a".repeat(1000)).is_ok());
        assert!(matches!(
            Query::new(&"a".repeat(1001)),
            Err(PipelineError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_length_counts_characters() {
        let text = "é".repeat(1000);
        assert!(Query::new(&text).is_ok());
    }

    #[test]
    fn test_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("user".to_string(), serde_json::json!("u-1"));
        let query = Query::new("hello").unwrap().with_metadata(metadata);

        assert_eq!(query.text(), "hello");
        assert_eq!(query.metadata()["user"], "u-1");
    }
}
