use std::sync::Arc;
use std::time::Duration;

use super::{BankingBackend, CachedValue};
use crate::cache::cache_key;
use crate::error::ApiError;
use crate::http::Page;
use crate::models::{Transaction, TransactionFilter, TransactionUpdate};

const KIND: &str = "transactions";

/// Transaction pages keyed by filter, keeping the pagination envelope
pub struct TransactionsStore<B: BankingBackend> {
    backend: Arc<B>,
    value: CachedValue<Page<Transaction>>,
}

impl<B: BankingBackend> TransactionsStore<B> {
    pub fn new(backend: Arc<B>, ttl: Duration) -> Self {
        Self {
            backend,
            value: CachedValue::new(ttl),
        }
    }

    pub async fn fetch_transactions(
        &self,
        filter: &TransactionFilter,
        force_refresh: bool,
    ) -> Result<Page<Transaction>, ApiError> {
        let key = cache_key(KIND, filter);
        let backend = self.backend.clone();
        let filter = filter.clone();
        self.value
            .load(&key, force_refresh, || async move { backend.list_transactions(&filter).await })
            .await
    }

    /// Save the update, patch the loaded page in place and drop every cached page
    pub async fn update_transaction(
        &self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> Result<Transaction, ApiError> {
        let updated = match self.backend.update_transaction(transaction_id, update).await {
            Ok(updated) => updated,
            Err(err) => return Err(self.value.fail(err).await),
        };

        self.value
            .modify_and_invalidate(KIND, |page| {
                if let Some(tx) = page.results.iter_mut().find(|tx| tx.id == updated.id) {
                    *tx = updated.clone();
                }
            })
            .await;
        Ok(updated)
    }

    pub async fn page(&self) -> Page<Transaction> {
        self.value.current().await
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.value.current().await.results
    }

    pub async fn is_loading(&self) -> bool {
        self.value.is_loading().await
    }

    pub async fn error(&self) -> Option<ApiError> {
        self.value.error().await
    }
}
