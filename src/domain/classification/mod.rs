//! Intent categories and classification results

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ensure_unit_interval;
use super::DomainError;

/// Intent category of a user query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    GeneralInquiry,
    TechnicalSupport,
    BillingQuestion,
    ProductInfo,
    Complaint,
    /// Admitted only through configuration
    Custom(String),
    Other,
}

impl Category {
    pub const DEFAULTS: [Category; 5] = [
        Category::GeneralInquiry,
        Category::TechnicalSupport,
        Category::BillingQuestion,
        Category::ProductInfo,
        Category::Complaint,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::GeneralInquiry => "general_inquiry",
            Category::TechnicalSupport => "technical_support",
            Category::BillingQuestion => "billing_question",
            Category::ProductInfo => "product_info",
            Category::Complaint => "complaint",
            Category::Custom(name) => name,
            Category::Other => "other",
        }
    }

    /// Map a normalized name onto a variant; unknown names become `Custom`
    pub fn from_name(name: &str) -> Self {
        match name {
            "general_inquiry" => Category::GeneralInquiry,
            "technical_support" => Category::TechnicalSupport,
            "billing_question" => Category::BillingQuestion,
            "product_info" => Category::ProductInfo,
            "complaint" => Category::Complaint,
            "other" => Category::Other,
            custom => Category::Custom(custom.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from_name(&normalize(&value))
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// The closed set of categories the classifier may return
///
/// Always contains [`Category::Other`] as the fallback.
#[derive(Debug, Clone)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Build from configured names
    pub fn from_names<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<Category> = Vec::new();

        for name in names {
            let normalized = normalize(name.as_ref());
            if normalized.is_empty() {
                return Err(DomainError::configuration("Category names must not be empty"));
            }
            let category = Category::from_name(&normalized);
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        if !categories.contains(&Category::Other) {
            categories.push(Category::Other);
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.as_str()).collect()
    }

    /// Resolve model output to a member of the set
    pub fn resolve(&self, raw: &str) -> Option<Category> {
        let candidate = Category::from_name(&normalize(raw));
        self.categories.contains(&candidate).then_some(candidate)
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        let mut categories = Category::DEFAULTS.to_vec();
        categories.push(Category::Other);
        Self { categories }
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub confidence: f64,
    pub reasoning: String,
    pub needs_context: bool,
}

impl Classification {
    pub fn new(
        category: Category,
        confidence: f64,
        reasoning: impl Into<String>,
        needs_context: bool,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            category,
            confidence: ensure_unit_interval("classification confidence", confidence)?,
            reasoning: reasoning.into(),
            needs_context,
        })
    }
}
