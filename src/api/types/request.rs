//! Request and response bodies for the pipeline endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Classification, ContextDocument};

/// Body shared by `/process`, `/classify` and `/retrieve`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub classification: Classification,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub retrieved_docs: Vec<String>,
    pub sources: Vec<String>,
}

impl RetrieveResponse {
    pub fn new(query: impl Into<String>, docs: Vec<ContextDocument>) -> Self {
        let (sources, retrieved_docs) = docs.into_iter().map(|doc| (doc.id, doc.text)).unzip();

        Self {
            query: query.into(),
            retrieved_docs,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_is_optional() {
        let request: QueryRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();

        assert_eq!(request.text, "hello");
        assert!(request.metadata.is_empty());
    }

    #[test]
    fn test_retrieve_response_splits_ids_and_text() {
        let response = RetrieveResponse::new(
            "reset",
            vec![ContextDocument::new("q001", "Q: reset\nA: link")],
        );

        assert_eq!(response.sources, vec!["q001".to_string()]);
        assert_eq!(response.retrieved_docs, vec!["Q: reset\nA: link".to_string()]);
    }
}
