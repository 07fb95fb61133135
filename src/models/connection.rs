use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw connection status reported by the aggregator for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Updating,
    Updated,
    LoginError,
    WaitingUserInput,
    Outdated,
    Error,
    #[serde(other)]
    Unknown,
}

/// Phase of the sync execution currently running for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    LoginInProgress,
    AccountsInProgress,
    CreditcardsInProgress,
    InvestmentsInProgress,
    TransactionsInProgress,
    Merging,
    Success,
    PartialSuccess,
    Error,
    InvalidCredentials,
    #[serde(other)]
    Unknown,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Updating => "UPDATING",
            ProviderStatus::Updated => "UPDATED",
            ProviderStatus::LoginError => "LOGIN_ERROR",
            ProviderStatus::WaitingUserInput => "WAITING_USER_INPUT",
            ProviderStatus::Outdated => "OUTDATED",
            ProviderStatus::Error => "ERROR",
            ProviderStatus::Unknown => "UNKNOWN",
        }
    }

    /// Statuses that end polling as a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProviderStatus::Error
                | ProviderStatus::LoginError
                | ProviderStatus::Outdated
                | ProviderStatus::WaitingUserInput
        )
    }
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::LoginInProgress => "LOGIN_IN_PROGRESS",
            ExecutionStatus::AccountsInProgress => "ACCOUNTS_IN_PROGRESS",
            ExecutionStatus::CreditcardsInProgress => "CREDITCARDS_IN_PROGRESS",
            ExecutionStatus::InvestmentsInProgress => "INVESTMENTS_IN_PROGRESS",
            ExecutionStatus::TransactionsInProgress => "TRANSACTIONS_IN_PROGRESS",
            ExecutionStatus::Merging => "MERGING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::PartialSuccess => "PARTIAL_SUCCESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::InvalidCredentials => "INVALID_CREDENTIALS",
            ExecutionStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Error | ExecutionStatus::InvalidCredentials)
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Institution behind a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
}

/// One bank login session tracked by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankConnection {
    pub id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    pub connector: Connector,
    pub status: ProviderStatus,
    #[serde(default)]
    pub execution_status: Option<ExecutionStatus>,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub accounts_count: u32,
}

impl BankConnection {
    /// The connection needs the user to reconnect or enter a code
    pub fn needs_attention(&self) -> bool {
        self.status.is_failure()
    }
}

/// Body of `GET /connections/{id}/status`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionStatusResponse {
    #[serde(default)]
    pub status: Option<ProviderStatus>,
    #[serde(default)]
    pub execution_status: Option<ExecutionStatus>,
    #[serde(default)]
    pub sync_complete: bool,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of `POST /connections/{id}/sync` and `POST /accounts/{id}/sync`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncTrigger {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<ProviderStatus>,
    #[serde(default)]
    pub sync_started: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_codes_decode_to_unknown() {
        let response: ConnectionStatusResponse = serde_json::from_value(json!({
            "status": "SOMETHING_NEW",
            "execution_status": "IDENTITY_IN_PROGRESS",
            "sync_complete": false
        }))
        .unwrap();

        assert_eq!(response.status, Some(ProviderStatus::Unknown));
        assert_eq!(response.execution_status, Some(ExecutionStatus::Unknown));
        assert!(!response.requires_action);
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let response: ConnectionStatusResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response, ConnectionStatusResponse::default());
    }

    #[test]
    fn failure_classification() {
        assert!(ProviderStatus::LoginError.is_failure());
        assert!(ProviderStatus::WaitingUserInput.is_failure());
        assert!(!ProviderStatus::Updating.is_failure());
        assert!(!ProviderStatus::Updated.is_failure());
        assert!(ExecutionStatus::InvalidCredentials.is_failure());
        assert!(!ExecutionStatus::PartialSuccess.is_failure());
    }

    #[test]
    fn codes_round_trip_through_display() {
        let decoded: ExecutionStatus = serde_json::from_value(json!("CREDITCARDS_IN_PROGRESS")).unwrap();
        assert_eq!(decoded.to_string(), "CREDITCARDS_IN_PROGRESS");
    }
}
