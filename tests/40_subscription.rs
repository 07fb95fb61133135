mod common;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use caixahub_client::error::ErrorKind;
use caixahub_client::models::{NewRule, UsageType};
use caixahub_client::services::{RulesService, SubscriptionService};
use caixahub_client::usage::{UsageTracker, WarningLevel};

#[tokio::test]
async fn usage_drives_warning_levels() -> Result<()> {
    let server = common::MockServer::start().await?;
    let subscriptions = SubscriptionService::new(server.logged_in_client()?);

    let tracker = UsageTracker::new(Some(subscriptions.usage().await?));

    assert_eq!(tracker.warning_level(UsageType::Transactions), WarningLevel::Warning);
    assert_eq!(tracker.warning_level(UsageType::BankAccounts), WarningLevel::None);
    assert!(tracker.is_usage_limit_reached(UsageType::AiRequests));
    assert!(tracker.should_show_usage_warning());
    assert_eq!(tracker.warnings()[0], (UsageType::AiRequests, WarningLevel::Critical));
    Ok(())
}

#[tokio::test]
async fn partial_usage_payload_is_total() -> Result<()> {
    let server = common::MockServer::start().await?;
    *server.state.usage.lock().unwrap() = json!({
        "bank_accounts": {"used": 1, "limit": 2, "percentage": 50.0}
    });
    let subscriptions = SubscriptionService::new(server.logged_in_client()?);

    let tracker = UsageTracker::new(Some(subscriptions.usage().await?));
    assert_eq!(tracker.usage_percentage(UsageType::Transactions), 0.0);
    assert!(!tracker.should_show_usage_warning());
    Ok(())
}

#[tokio::test]
async fn trial_status_is_decoded() -> Result<()> {
    let server = common::MockServer::start().await?;
    let subscriptions = SubscriptionService::new(server.logged_in_client()?);

    let info = subscriptions.status().await?;
    assert!(info.is_active());
    assert!(info.is_trial());
    assert!(!info.requires_payment());
    assert!(info.trial_days_remaining(Utc::now()) > 0);
    assert_eq!(info.plan.map(|p| p.slug), Some("pro".to_string()));
    Ok(())
}

#[tokio::test]
async fn rule_field_errors_come_back_as_validation() -> Result<()> {
    let server = common::MockServer::start().await?;
    let rules = RulesService::new(server.logged_in_client()?);

    let err = rules
        .create(&NewRule::keywords("Uber", "missing", vec!["uber".to_string()]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "category: Category does not exist.");
    assert_eq!(err.field_error("category"), Some("Category does not exist."));

    let created = rules
        .create(&NewRule::keywords("Uber", "transport", vec!["uber".to_string()]))
        .await?;
    assert_eq!(created.id, "rule_1");

    // Local validation stops bad input before it reaches the backend
    let invalid = rules.create(&NewRule::keywords("  ", "transport", vec![])).await.unwrap_err();
    assert_eq!(invalid.kind, ErrorKind::Validation);
    assert_eq!(server.state.calls("POST /categories/rules"), 2);
    Ok(())
}
