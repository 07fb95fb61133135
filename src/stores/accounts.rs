use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{BankingBackend, CachedValue};
use crate::error::ApiError;
use crate::models::{BankAccount, SyncTrigger};

const KIND: &str = "accounts";

pub struct AccountsStore<B: BankingBackend> {
    backend: Arc<B>,
    value: CachedValue<Vec<BankAccount>>,
}

impl<B: BankingBackend> AccountsStore<B> {
    pub fn new(backend: Arc<B>, ttl: Duration) -> Self {
        Self {
            backend,
            value: CachedValue::new(ttl),
        }
    }

    pub async fn fetch_accounts(&self, force_refresh: bool) -> Result<Vec<BankAccount>, ApiError> {
        let backend = self.backend.clone();
        self.value
            .load(KIND, force_refresh, || async move { backend.list_accounts().await })
            .await
    }

    /// Trigger a backend sync, then reload the account list
    pub async fn sync_account(&self, account_id: &str) -> Result<SyncTrigger, ApiError> {
        let trigger = match self.backend.sync_account(account_id).await {
            Ok(trigger) => trigger,
            Err(err) => return Err(self.value.fail(err).await),
        };
        info!("Sync requested for account {}", account_id);

        self.value.invalidate(KIND).await;
        self.fetch_accounts(true).await?;
        Ok(trigger)
    }

    pub async fn accounts(&self) -> Vec<BankAccount> {
        self.value.current().await
    }

    pub async fn is_loading(&self) -> bool {
        self.value.is_loading().await
    }

    pub async fn error(&self) -> Option<ApiError> {
        self.value.error().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::fake::{account, FakeBackend};

    #[tokio::test(start_paused = true)]
    async fn cache_serves_until_ttl_then_refetches() {
        let backend = Arc::new(FakeBackend::seeded());
        let store = AccountsStore::new(backend.clone(), Duration::from_secs(30));

        store.fetch_accounts(false).await.unwrap();
        store.fetch_accounts(false).await.unwrap();
        assert_eq!(backend.calls(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        store.fetch_accounts(false).await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_and_repopulates() {
        let backend = Arc::new(FakeBackend::seeded());
        let store = AccountsStore::new(backend.clone(), Duration::from_secs(60));
        store.fetch_accounts(false).await.unwrap();

        backend.accounts.lock().unwrap().push(account("acc_2", "Poupanca"));
        assert_eq!(store.fetch_accounts(false).await.unwrap().len(), 1);
        assert_eq!(store.fetch_accounts(true).await.unwrap().len(), 2);

        // The forced load is what the cache now serves
        assert_eq!(store.fetch_accounts(false).await.unwrap().len(), 2);
        assert_eq!(backend.calls(), 2);
        assert_eq!(store.value.cached_entries().await, 1);
    }

    #[tokio::test]
    async fn sync_reloads_accounts() {
        let backend = Arc::new(FakeBackend::seeded());
        let store = AccountsStore::new(backend.clone(), Duration::from_secs(60));
        store.fetch_accounts(false).await.unwrap();

        backend.accounts.lock().unwrap().push(account("acc_2", "Poupanca"));
        let trigger = store.sync_account("acc_1").await.unwrap();

        assert!(trigger.sync_started);
        assert_eq!(store.accounts().await.len(), 2);
        assert_eq!(backend.calls(), 2);
    }
}
