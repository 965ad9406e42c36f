//! Knowledge entries fetched from blob storage over HTTPS
//!
//! The blob is read with a plain GET against a pre-signed URL, such as an
//! Azure Blob Storage SAS URL, so no storage SDK or account key is needed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use super::jsonl::parse_entries;
use crate::domain::knowledge::{KnowledgeSet, KnowledgeSource};
use crate::domain::DomainError;

/// JSONL knowledge blob behind a signed URL
#[derive(Debug, Clone)]
pub struct BlobKnowledgeSource {
    client: reqwest::Client,
    url: String,
}

impl BlobKnowledgeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Blob location without the signature query string
    fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }
}

#[async_trait]
impl KnowledgeSource for BlobKnowledgeSource {
    async fn load(&self) -> Result<KnowledgeSet, DomainError> {
        let response = self
            .client
            .get(&self.url)
            .header("x-ms-version", "2021-08-06")
            .send()
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to fetch knowledge blob {}: {}",
                    self.redacted_url(),
                    e
                ))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(
                blob = %self.redacted_url(),
                "Knowledge blob not found, starting with an empty knowledge base"
            );
            return Ok(KnowledgeSet::empty());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DomainError::configuration(format!(
                "Knowledge blob {} rejected the signed URL: HTTP {}",
                self.redacted_url(),
                status
            )));
        }
        if !status.is_success() {
            return Err(DomainError::storage(format!(
                "Knowledge blob {} returned HTTP {}",
                self.redacted_url(),
                status
            )));
        }

        let content = response.text().await.map_err(|e| {
            DomainError::storage(format!("Failed to read knowledge blob body: {}", e))
        })?;

        let set = KnowledgeSet::new(parse_entries(&content)?)?;
        info!(
            blob = %self.redacted_url(),
            entries = set.len(),
            fingerprint = %set.fingerprint(),
            "Loaded knowledge base"
        );

        Ok(set)
    }

    fn describe(&self) -> String {
        self.redacted_url().to_string()
    }
}
