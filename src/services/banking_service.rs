use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{HttpClient, Listing, Page};
use crate::models::{
    BankAccount, BankConnection, ConnectionStatusResponse, SyncTrigger, Transaction, TransactionFilter,
    TransactionUpdate,
};
use crate::sync::StatusSource;

/// Accounts, transactions and bank connections
#[derive(Debug, Clone)]
pub struct BankingService {
    http: HttpClient,
}

impl BankingService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list_accounts(&self) -> Result<Vec<BankAccount>, ApiError> {
        let listing: Listing<BankAccount> = self.http.get("/accounts").await?;
        Ok(listing.into_vec())
    }

    pub async fn sync_account(&self, account_id: &str) -> Result<SyncTrigger, ApiError> {
        let account_id = require_id(account_id, "account")?;
        self.http.post_empty(&format!("/accounts/{}/sync", account_id)).await
    }

    pub async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Page<Transaction>, ApiError> {
        let listing: Listing<Transaction> = self.http.get_query("/transactions", filter).await?;
        Ok(listing.into_page())
    }

    pub async fn update_transaction(
        &self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> Result<Transaction, ApiError> {
        let transaction_id = require_id(transaction_id, "transaction")?;
        if update.is_empty() {
            return Err(ApiError::invalid_input("Nothing to update"));
        }
        self.http.patch(&format!("/transactions/{}", transaction_id), update).await
    }

    pub async fn list_connections(&self) -> Result<Vec<BankConnection>, ApiError> {
        let listing: Listing<BankConnection> = self.http.get("/connections").await?;
        Ok(listing.into_vec())
    }

    pub async fn connection_status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ApiError> {
        let connection_id = require_id(connection_id, "connection")?;
        self.http.get(&format!("/connections/{}/status", connection_id)).await
    }

    /// Ask the backend to start a new sync for the connection
    pub async fn sync_connection(&self, connection_id: &str) -> Result<SyncTrigger, ApiError> {
        let connection_id = require_id(connection_id, "connection")?;
        self.http.post_empty(&format!("/connections/{}/sync", connection_id)).await
    }

    pub async fn disconnect(&self, connection_id: &str) -> Result<(), ApiError> {
        let connection_id = require_id(connection_id, "connection")?;
        self.http.delete(&format!("/connections/{}", connection_id)).await
    }
}

#[async_trait]
impl StatusSource for BankingService {
    async fn connection_status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ApiError> {
        BankingService::connection_status(self, connection_id).await
    }
}

// Ids are interpolated into paths, so reject anything that would change the route
fn require_id<'a>(id: &'a str, what: &str) -> Result<&'a str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::invalid_input(format!("Missing {} id", what)));
    }
    if id.contains(['/', '?', '#']) {
        return Err(ApiError::invalid_input(format!("Invalid {} id: {}", what, id)));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_single_path_segments() {
        assert_eq!(require_id(" conn_1 ", "connection").unwrap(), "conn_1");
        assert!(require_id("", "connection").is_err());
        assert!(require_id("../admin", "connection").is_err());
        assert!(require_id("a?b=1", "connection").is_err());
    }
}
