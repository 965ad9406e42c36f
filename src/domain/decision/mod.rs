//! Final disposition of a generated answer
//!
//! The arbiter walks an ordered rule table and the first rule whose
//! thresholds are met decides. Tables are checked when built: every rule's
//! thresholds must be in range, the last rule must match everything, and
//! outcomes may only become less permissive further down the table. With
//! threshold rules that last condition makes the decision monotone in both
//! inputs.

use serde::{Deserialize, Serialize};

use super::quality::round2;
use super::DomainError;

/// Outcome ordered from least to most permissive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Reject,
    ManualReview,
    Accept,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Reject => "reject",
            Disposition::ManualReview => "manual_review",
            Disposition::Accept => "accept",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    pub name: String,
    /// Inclusive lower bound on the overall quality score, 0..=100
    #[serde(default)]
    pub min_quality_score: f64,
    /// Inclusive lower bound on classification confidence, 0..=1
    #[serde(default)]
    pub min_confidence: f64,
    pub outcome: Disposition,
    pub reasoning: String,
}

impl DecisionRule {
    pub fn new(
        name: impl Into<String>,
        min_quality_score: f64,
        min_confidence: f64,
        outcome: Disposition,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            min_quality_score,
            min_confidence,
            outcome,
            reasoning: reasoning.into(),
        }
    }

    pub fn matches(&self, quality_score: f64, confidence: f64) -> bool {
        quality_score >= self.min_quality_score && confidence >= self.min_confidence
    }

    pub fn is_catch_all(&self) -> bool {
        self.min_quality_score <= 0.0 && self.min_confidence <= 0.0
    }
}

/// Validated, ordered rule table
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<DecisionRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<DecisionRule>) -> Result<Self, DomainError> {
        let Some(last) = rules.last() else {
            return Err(DomainError::configuration("Decision rule table is empty"));
        };

        if !last.is_catch_all() {
            return Err(DomainError::configuration(format!(
                "Last decision rule '{}' must match every input",
                last.name
            )));
        }

        for rule in &rules {
            if !(rule.min_quality_score.is_finite()
                && (0.0..=100.0).contains(&rule.min_quality_score))
            {
                return Err(DomainError::configuration(format!(
                    "Rule '{}': min_quality_score must be within [0, 100]",
                    rule.name
                )));
            }
            if !(rule.min_confidence.is_finite() && (0.0..=1.0).contains(&rule.min_confidence)) {
                return Err(DomainError::configuration(format!(
                    "Rule '{}': min_confidence must be within [0, 1]",
                    rule.name
                )));
            }
        }

        for pair in rules.windows(2) {
            if pair[1].outcome > pair[0].outcome {
                return Err(DomainError::configuration(format!(
                    "Rule '{}' ({}) is more permissive than the earlier rule '{}' ({})",
                    pair[1].name, pair[1].outcome, pair[0].name, pair[0].outcome
                )));
            }
        }

        Ok(Self { rules })
    }

    /// The default four-rule table with a configurable acceptance threshold
    pub fn standard(threshold: f64) -> Result<Self, DomainError> {
        Self::new(standard_rules(threshold))
    }

    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    /// First matching rule; the catch-all guarantees one exists
    fn first_match(&self, quality_score: f64, confidence: f64) -> &DecisionRule {
        self.rules
            .iter()
            .find(|r| r.matches(quality_score, confidence))
            .unwrap_or_else(|| &self.rules[self.rules.len() - 1])
    }
}

fn standard_rules(threshold: f64) -> Vec<DecisionRule> {
    vec![
        DecisionRule::new(
            "high_quality",
            90.0,
            0.8,
            Disposition::Accept,
            "High quality score and high classification confidence",
        ),
        DecisionRule::new(
            "meets_threshold",
            threshold,
            0.6,
            Disposition::Accept,
            "Quality score meets threshold with reasonable confidence",
        ),
        DecisionRule::new(
            "borderline",
            50.0,
            0.0,
            Disposition::ManualReview,
            "Quality score borderline, requires human review",
        ),
        DecisionRule::new(
            "fallback",
            0.0,
            0.0,
            Disposition::Reject,
            "Quality score below threshold or low confidence",
        ),
    ]
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            rules: standard_rules(70.0),
        }
    }
}

/// Relative weights of quality and classification confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub quality: f64,
    pub confidence: f64,
}

impl BlendWeights {
    /// Normalize so the weights sum to one
    pub fn new(quality: f64, confidence: f64) -> Result<Self, DomainError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        let total = quality + confidence;

        if !valid(quality) || !valid(confidence) || total <= 0.0 {
            return Err(DomainError::configuration(format!(
                "Decision weights must be non-negative with a positive sum, got {} and {}",
                quality, confidence
            )));
        }

        Ok(Self {
            quality: quality / total,
            confidence: confidence / total,
        })
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            quality: 0.7,
            confidence: 0.3,
        }
    }
}

/// Arbiter output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: Disposition,
    pub confidence: f64,
    pub reasoning: String,
    pub quality_score: f64,
}

/// Pure mapping from (quality score, classification confidence) to a decision
#[derive(Debug, Clone)]
pub struct DecisionArbiter {
    table: RuleTable,
    weights: BlendWeights,
}

impl DecisionArbiter {
    pub fn new(table: RuleTable, weights: BlendWeights) -> Self {
        Self { table, weights }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn judge(&self, quality_score: f64, classification_confidence: f64) -> Decision {
        let q = clamp_or_zero(quality_score, 100.0);
        let c = clamp_or_zero(classification_confidence, 1.0);

        let rule = self.table.first_match(q, c);
        let confidence = round2(self.weights.quality * q / 100.0 + self.weights.confidence * c);

        Decision {
            decision: rule.outcome,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: rule.reasoning.clone(),
            quality_score: q,
        }
    }
}

impl Default for DecisionArbiter {
    fn default() -> Self {
        Self::new(RuleTable::default(), BlendWeights::default())
    }
}

fn clamp_or_zero(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
