use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Keyword,
    AmountRange,
    Counterpart,
    Pattern,
    #[serde(other)]
    Unknown,
}

/// Server-evaluated rule that assigns a category to matching transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: String,
    pub name: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: Value,
    pub category: String,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub match_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub rule_type: RuleType,
    pub conditions: Value,
    pub category: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRule {
    /// Keyword rule matching any of the given words in the description
    pub fn keywords(name: impl Into<String>, category: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            name: name.into(),
            rule_type: RuleType::Keyword,
            conditions: serde_json::json!({ "keywords": keywords }),
            category: category.into(),
            priority: 0,
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut field_errors = HashMap::new();

        if self.name.trim().is_empty() {
            field_errors.insert("name".to_string(), vec!["Rule name is required".to_string()]);
        }
        if self.category.trim().is_empty() {
            field_errors.insert("category".to_string(), vec!["Choose a category".to_string()]);
        }
        if !self.conditions.is_object() {
            field_errors.insert("conditions".to_string(), vec!["Conditions must be a JSON object".to_string()]);
        }
        if self.rule_type == RuleType::Unknown {
            field_errors.insert("rule_type".to_string(), vec!["Unsupported rule type".to_string()]);
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation("Invalid rule", field_errors))
        }
    }
}

/// Body of `PATCH /categories/rules/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}
