//! Quality criteria, per-criterion checks and their aggregate

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::ensure_unit_interval;
use super::DomainError;

/// One dimension an answer is evaluated on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCriterion {
    pub name: String,
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl QualityCriterion {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// relevance, completeness, accuracy, clarity, professionalism
    pub fn defaults() -> Vec<QualityCriterion> {
        vec![
            Self::new(
                "relevance",
                "Does the answer directly address the user's question?",
            ),
            Self::new(
                "completeness",
                "Does the answer cover everything the question asks for?",
            ),
            Self::new(
                "accuracy",
                "Is the answer factually consistent with the provided context, without invented details?",
            ),
            Self::new(
                "clarity",
                "Is the answer clear, well organized and easy to follow?",
            ),
            Self::new(
                "professionalism",
                "Is the tone courteous and appropriate for customer support?",
            ),
        ]
    }
}

/// Ordered criteria, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct CriteriaSet {
    criteria: Vec<QualityCriterion>,
}

impl CriteriaSet {
    pub fn new(criteria: Vec<QualityCriterion>) -> Result<Self, DomainError> {
        if criteria.is_empty() {
            return Err(DomainError::configuration(
                "At least one quality criterion is required",
            ));
        }

        let mut names = HashSet::new();
        for criterion in &criteria {
            if criterion.name.trim().is_empty() {
                return Err(DomainError::configuration("Criterion name must not be empty"));
            }
            if !names.insert(criterion.name.as_str()) {
                return Err(DomainError::configuration(format!(
                    "Duplicate quality criterion '{}'",
                    criterion.name
                )));
            }
            if !(criterion.weight.is_finite() && criterion.weight > 0.0) {
                return Err(DomainError::configuration(format!(
                    "Criterion '{}' must have a positive weight, got {}",
                    criterion.name, criterion.weight
                )));
            }
        }

        Ok(Self { criteria })
    }

    pub fn criteria(&self) -> &[QualityCriterion] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    fn weight_of(&self, name: &str) -> f64 {
        self.criteria
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.weight)
            .unwrap_or_else(default_weight)
    }

    /// Combine checks into the weighted aggregate
    pub fn aggregate(&self, checks: Vec<QualityCheck>) -> QualityCheckResult {
        let weights: Vec<f64> = checks.iter().map(|c| self.weight_of(&c.name)).collect();
        QualityCheckResult::from_checks(checks, &weights)
    }
}

impl Default for CriteriaSet {
    fn default() -> Self {
        Self {
            criteria: QualityCriterion::defaults(),
        }
    }
}

/// Outcome of one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub passed: bool,
    pub score: f64,
    pub explanation: String,
}

impl QualityCheck {
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        score: f64,
        explanation: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            name: name.into(),
            passed,
            score: ensure_unit_interval("quality score", score)?,
            explanation: explanation.into(),
        })
    }

    /// A criterion that could not be evaluated
    pub fn failed_evaluation(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            name: name.into(),
            passed: false,
            score: 0.0,
            explanation: format!("Evaluation failed: {}", reason),
        }
    }
}

/// All checks plus the aggregate score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckResult {
    pub checks: Vec<QualityCheck>,
    pub overall_score: f64,
    pub passed_all: bool,
}

impl QualityCheckResult {
    /// Weighted mean of the scores times 100, rounded to two decimals
    ///
    /// `weights` pairs with `checks` by position. Equal weights are used when
    /// the lengths differ or the weights sum to zero.
    pub fn from_checks(checks: Vec<QualityCheck>, weights: &[f64]) -> Self {
        let total_weight: f64 = weights.iter().sum();
        let usable = weights.len() == checks.len() && total_weight > 0.0;

        let mean = if checks.is_empty() {
            0.0
        } else if usable {
            checks
                .iter()
                .zip(weights)
                .map(|(c, w)| c.score * w)
                .sum::<f64>()
                / total_weight
        } else {
            checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64
        };

        let overall_score = round2((mean * 100.0).clamp(0.0, 100.0));
        let passed_all = !checks.is_empty() && checks.iter().all(|c| c.passed);

        Self {
            checks,
            overall_score,
            passed_all,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &QualityCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
