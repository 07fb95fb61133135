use serde::Serialize;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{ConnectionStatusResponse, ExecutionStatus, ProviderStatus};

pub const DEFAULT_MESSAGE: &str = "Processing...";
pub const STARTING_MESSAGE: &str = "Starting sync...";
pub const TIMEOUT_MESSAGE: &str = "Timeout exceeded. Please try again.";
pub const CHECK_FAILED_MESSAGE: &str = "Failed to check sync status";

/// What the poller currently knows about a connection's sync.
///
/// A fresh value is published on every tick; readers only ever see whole values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SyncStatus {
    pub is_polling: bool,
    pub status: Option<ProviderStatus>,
    pub execution_status: Option<ExecutionStatus>,
    pub message: String,
    pub is_complete: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

/// How a tick ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Complete,
    Failed,
    TimedOut,
}

fn execution_message(execution: ExecutionStatus) -> Option<&'static str> {
    let message = match execution {
        ExecutionStatus::LoginInProgress => "Connecting to bank",
        ExecutionStatus::AccountsInProgress => "Loading accounts",
        ExecutionStatus::CreditcardsInProgress => "Loading credit cards",
        ExecutionStatus::InvestmentsInProgress => "Loading investments",
        ExecutionStatus::TransactionsInProgress => "Syncing transactions",
        ExecutionStatus::Merging => "Consolidating data",
        ExecutionStatus::Success => "Sync completed successfully",
        ExecutionStatus::PartialSuccess => "Sync partially completed",
        ExecutionStatus::Error => "Sync error",
        ExecutionStatus::InvalidCredentials => "Invalid credentials",
        ExecutionStatus::Unknown => return None,
    };
    Some(message)
}

fn status_message(status: ProviderStatus) -> Option<&'static str> {
    let message = match status {
        ProviderStatus::Updating => "Updating data",
        ProviderStatus::Updated => "Data updated",
        ProviderStatus::LoginError => "Bank login failed",
        ProviderStatus::WaitingUserInput => "Waiting for your input",
        ProviderStatus::Outdated => "Connection outdated",
        ProviderStatus::Error => "Connection error",
        ProviderStatus::Unknown => return None,
    };
    Some(message)
}

/// Progress text for a status pair: execution phase first, then connection status.
pub fn derive_message(execution: Option<ExecutionStatus>, status: Option<ProviderStatus>) -> &'static str {
    execution
        .and_then(execution_message)
        .or_else(|| status.and_then(status_message))
        .unwrap_or(DEFAULT_MESSAGE)
}

/// Decide whether a response ends polling. First match wins.
pub fn classify(response: &ConnectionStatusResponse, elapsed: Duration, timeout: Duration) -> TickOutcome {
    if response.sync_complete {
        return TickOutcome::Complete;
    }

    let status_failed = response.status.map_or(false, |s| s.is_failure());
    let execution_failed = response.execution_status.map_or(false, |e| e.is_failure());
    if response.requires_action || status_failed || execution_failed {
        return TickOutcome::Failed;
    }

    if elapsed >= timeout {
        return TickOutcome::TimedOut;
    }

    TickOutcome::Continue
}

impl SyncStatus {
    /// Published as soon as polling starts, before the first response arrives
    pub fn starting() -> Self {
        Self {
            is_polling: true,
            message: STARTING_MESSAGE.to_string(),
            ..Self::default()
        }
    }

    /// Status after one successful status check
    pub fn from_response(response: &ConnectionStatusResponse, elapsed: Duration, timeout: Duration) -> Self {
        let outcome = classify(response, elapsed, timeout);
        let message = match outcome {
            TickOutcome::TimedOut => TIMEOUT_MESSAGE,
            _ => derive_message(response.execution_status, response.status),
        };

        Self {
            is_polling: outcome == TickOutcome::Continue,
            status: response.status,
            execution_status: response.execution_status,
            message: message.to_string(),
            is_complete: outcome == TickOutcome::Complete,
            has_error: matches!(outcome, TickOutcome::Failed | TickOutcome::TimedOut),
            error_message: match outcome {
                TickOutcome::Failed => response.error_message.clone(),
                _ => None,
            },
        }
    }

    /// The status request itself failed
    pub fn check_failed(previous: &SyncStatus, err: &ApiError) -> Self {
        Self {
            is_polling: false,
            status: previous.status,
            execution_status: previous.execution_status,
            message: CHECK_FAILED_MESSAGE.to_string(),
            is_complete: false,
            has_error: true,
            error_message: Some(err.message.clone()),
        }
    }

    /// The overall budget ran out while a request was still outstanding
    pub fn timed_out(previous: &SyncStatus) -> Self {
        Self {
            is_polling: false,
            status: previous.status,
            execution_status: previous.execution_status,
            message: TIMEOUT_MESSAGE.to_string(),
            is_complete: false,
            has_error: true,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.has_error
    }
}
