use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub price_monthly: Option<Decimal>,
}

/// Body of `GET /subscriptions/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub status: SubscriptionState,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl SubscriptionInfo {
    pub fn is_active(&self) -> bool {
        matches!(self.status, SubscriptionState::Active | SubscriptionState::Trialing)
    }

    pub fn is_trial(&self) -> bool {
        self.status == SubscriptionState::Trialing
    }

    /// Billing needs attention before the account is usable again
    pub fn requires_payment(&self) -> bool {
        matches!(
            self.status,
            SubscriptionState::PastDue | SubscriptionState::Unpaid | SubscriptionState::Incomplete
        )
    }

    /// Whole days left in the trial, never negative; zero outside a trial
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> i64 {
        match (self.is_trial(), self.trial_ends_at) {
            (true, Some(ends_at)) if ends_at > now => {
                let remaining = ends_at - now;
                // A partial day still counts as a day left
                let days = remaining.num_days();
                if remaining > chrono::Duration::days(days) {
                    days + 1
                } else {
                    days
                }
            }
            _ => 0,
        }
    }
}

/// Hosted checkout started with `POST /subscriptions/checkout`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Usage categories tracked against plan limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Transactions,
    BankAccounts,
    AiRequests,
}

impl UsageType {
    pub const ALL: [UsageType; 3] = [UsageType::Transactions, UsageType::BankAccounts, UsageType::AiRequests];

    pub fn label(&self) -> &'static str {
        match self {
            UsageType::Transactions => "transactions",
            UsageType::BankAccounts => "bank_accounts",
            UsageType::AiRequests => "ai_requests",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageItem {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
}

/// Body of `GET /subscriptions/usage`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLimits {
    #[serde(default)]
    pub transactions: Option<UsageItem>,
    #[serde(default)]
    pub bank_accounts: Option<UsageItem>,
    #[serde(default)]
    pub ai_requests: Option<UsageItem>,
}

impl UsageLimits {
    pub fn get(&self, usage_type: UsageType) -> Option<&UsageItem> {
        match usage_type {
            UsageType::Transactions => self.transactions.as_ref(),
            UsageType::BankAccounts => self.bank_accounts.as_ref(),
            UsageType::AiRequests => self.ai_requests.as_ref(),
        }
    }
}
