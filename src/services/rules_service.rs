use serde_json::json;

use crate::error::ApiError;
use crate::http::{HttpClient, Listing};
use crate::models::{CategoryRule, NewRule, RuleUpdate};

/// Categorisation rules. Matching runs on the backend.
#[derive(Debug, Clone)]
pub struct RulesService {
    http: HttpClient,
}

impl RulesService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<CategoryRule>, ApiError> {
        let listing: Listing<CategoryRule> = self.http.get("/categories/rules").await?;
        let mut rules = listing.into_vec();
        // Higher priority first, as the backend evaluates them
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(rules)
    }

    pub async fn create(&self, rule: &NewRule) -> Result<CategoryRule, ApiError> {
        rule.validate()?;
        self.http.post("/categories/rules", rule).await
    }

    pub async fn update(&self, rule_id: &str, update: &RuleUpdate) -> Result<CategoryRule, ApiError> {
        self.http.patch(&rule_path(rule_id)?, update).await
    }

    pub async fn set_active(&self, rule_id: &str, active: bool) -> Result<CategoryRule, ApiError> {
        self.http.patch(&rule_path(rule_id)?, &json!({ "is_active": active })).await
    }

    pub async fn delete(&self, rule_id: &str) -> Result<(), ApiError> {
        self.http.delete(&rule_path(rule_id)?).await
    }
}

fn rule_path(rule_id: &str) -> Result<String, ApiError> {
    let rule_id = rule_id.trim();
    if rule_id.is_empty() || rule_id.contains('/') {
        return Err(ApiError::invalid_input(format!("Invalid rule id: '{}'", rule_id)));
    }
    Ok(format!("/categories/rules/{}", rule_id))
}
