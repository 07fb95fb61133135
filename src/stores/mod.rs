//! Client-side state for accounts, transactions and bank connections.
//!
//! Each store keeps the last loaded value, a loading flag, the last error
//! and its own TTL cache. Stores never invalidate each other.

pub mod accounts;
pub mod connections;
pub mod transactions;

pub use accounts::AccountsStore;
pub use connections::ConnectionsStore;
pub use transactions::TransactionsStore;

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::http::Page;
use crate::models::{BankAccount, BankConnection, SyncTrigger, Transaction, TransactionFilter, TransactionUpdate};
use crate::services::BankingService;

/// Backend operations the stores depend on
#[async_trait]
pub trait BankingBackend: Send + Sync + 'static {
    async fn list_accounts(&self) -> Result<Vec<BankAccount>, ApiError>;
    async fn sync_account(&self, account_id: &str) -> Result<SyncTrigger, ApiError>;
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Page<Transaction>, ApiError>;
    async fn update_transaction(
        &self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> Result<Transaction, ApiError>;
    async fn list_connections(&self) -> Result<Vec<BankConnection>, ApiError>;
    async fn sync_connection(&self, connection_id: &str) -> Result<SyncTrigger, ApiError>;
    async fn disconnect(&self, connection_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl BankingBackend for BankingService {
    async fn list_accounts(&self) -> Result<Vec<BankAccount>, ApiError> {
        BankingService::list_accounts(self).await
    }

    async fn sync_account(&self, account_id: &str) -> Result<SyncTrigger, ApiError> {
        BankingService::sync_account(self, account_id).await
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Page<Transaction>, ApiError> {
        BankingService::list_transactions(self, filter).await
    }

    async fn update_transaction(
        &self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> Result<Transaction, ApiError> {
        BankingService::update_transaction(self, transaction_id, update).await
    }

    async fn list_connections(&self) -> Result<Vec<BankConnection>, ApiError> {
        BankingService::list_connections(self).await
    }

    async fn sync_connection(&self, connection_id: &str) -> Result<SyncTrigger, ApiError> {
        BankingService::sync_connection(self, connection_id).await
    }

    async fn disconnect(&self, connection_id: &str) -> Result<(), ApiError> {
        BankingService::disconnect(self, connection_id).await
    }
}

#[derive(Debug)]
struct State<V> {
    current: V,
    cache: TtlCache<V>,
    error: Option<ApiError>,
    /// Bumped by every invalidation; loads started under an older epoch are not stored
    epoch: u64,
    /// Sequence of the most recent request; only that one may set `current`
    latest_request: u64,
}

/// Counts a load as in flight until it finishes or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A value loaded from the backend, cached per key
#[derive(Debug)]
pub(crate) struct CachedValue<V> {
    state: RwLock<State<V>>,
    in_flight: AtomicUsize,
}

impl<V: Clone + Default + Send + Sync> CachedValue<V> {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(State {
                current: V::default(),
                cache: TtlCache::new(ttl),
                error: None,
                epoch: 0,
                latest_request: 0,
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Serve `key` from the cache unless `force_refresh`, otherwise fetch and repopulate.
    ///
    /// A fetch that overlaps an invalidation or a newer request still returns its
    /// value but leaves the cache and `current` alone.
    pub(crate) async fn load<F, Fut>(&self, key: &str, force_refresh: bool, fetch: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>>,
    {
        let (request, epoch, _in_flight) = {
            let mut state = self.state.write().await;
            state.latest_request += 1;
            if !force_refresh {
                if let Some(hit) = state.cache.get(key) {
                    debug!("Cache hit for {}", key);
                    state.current = hit.clone();
                    state.error = None;
                    return Ok(hit);
                }
            }
            state.error = None;
            (state.latest_request, state.epoch, InFlight::enter(&self.in_flight))
        };

        let result = fetch().await;

        let mut state = self.state.write().await;
        let fresh = state.epoch == epoch;
        let latest = state.latest_request == request;
        match result {
            Ok(value) => {
                if fresh {
                    state.cache.insert(key, value.clone());
                } else {
                    debug!("Discarding {} loaded before an invalidation", key);
                }
                if fresh && latest {
                    state.current = value.clone();
                }
                Ok(value)
            }
            Err(err) => {
                if latest {
                    state.error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    pub(crate) async fn current(&self) -> V {
        self.state.read().await.current.clone()
    }

    pub(crate) async fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub(crate) async fn error(&self) -> Option<ApiError> {
        self.state.read().await.error.clone()
    }

    /// Record a failure from a mutation and hand it back
    pub(crate) async fn fail(&self, err: ApiError) -> ApiError {
        self.state.write().await.error = Some(err.clone());
        err
    }

    /// Edit the in-memory value and drop every cached entry of `kind`
    pub(crate) async fn modify_and_invalidate<F>(&self, kind: &str, edit: F)
    where
        F: FnOnce(&mut V),
    {
        let mut state = self.state.write().await;
        edit(&mut state.current);
        state.cache.invalidate_kind(kind);
        state.epoch += 1;
        state.error = None;
    }

    pub(crate) async fn invalidate(&self, kind: &str) {
        let mut state = self.state.write().await;
        state.cache.invalidate_kind(kind);
        state.epoch += 1;
    }

    #[cfg(test)]
    pub(crate) async fn cached_entries(&self) -> usize {
        self.state.read().await.cache.len()
    }
}

/// All three banking stores over one backend
pub struct BankingStores<B: BankingBackend> {
    pub accounts: AccountsStore<B>,
    pub transactions: TransactionsStore<B>,
    pub connections: ConnectionsStore<B>,
}

impl<B: BankingBackend> BankingStores<B> {
    pub fn new(backend: Arc<B>, ttl: Duration) -> Self {
        Self {
            accounts: AccountsStore::new(backend.clone(), ttl),
            transactions: TransactionsStore::new(backend.clone(), ttl),
            connections: ConnectionsStore::new(backend, ttl),
        }
    }

    pub fn from_config(backend: Arc<B>, config: &AppConfig) -> Self {
        Self::new(backend, config.cache_ttl())
    }

    /// Load accounts, the first transactions page and connections concurrently
    pub async fn refresh_all(&self, force_refresh: bool) -> Result<(), ApiError> {
        let filter = TransactionFilter::default();
        futures::try_join!(
            self.accounts.fetch_accounts(force_refresh),
            self.transactions.fetch_transactions(&filter, force_refresh),
            self.connections.fetch_connections(force_refresh),
        )?;
        Ok(())
    }
}
