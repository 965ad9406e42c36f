use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Stage;
use crate::domain::classification::Classification;
use crate::domain::decision::Decision;
use crate::domain::quality::QualityCheckResult;

/// Wall-clock duration of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: f64,
    /// False when the stage was bypassed, e.g. retrieval for a query that
    /// needs no context
    pub executed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub sources_used: Vec<String>,
    pub generator_confidence: f64,
    pub stage_timings: Vec<StageTiming>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub request: HashMap<String, serde_json::Value>,
}

/// Everything produced for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    pub classification: Classification,
    pub retrieved_docs: Vec<String>,
    pub answer: String,
    pub quality_checks: QualityCheckResult,
    pub judge_decision: Decision,
    pub processing_time_ms: f64,
    pub metadata: ResultMetadata,
}

impl PipelineResult {
    pub fn timing(&self, stage: Stage) -> Option<&StageTiming> {
        self.metadata.stage_timings.iter().find(|t| t.stage == stage)
    }
}
