use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{BankingBackend, CachedValue};
use crate::error::ApiError;
use crate::models::{BankConnection, SyncTrigger};

const KIND: &str = "connections";

pub struct ConnectionsStore<B: BankingBackend> {
    backend: Arc<B>,
    value: CachedValue<Vec<BankConnection>>,
}

impl<B: BankingBackend> ConnectionsStore<B> {
    pub fn new(backend: Arc<B>, ttl: Duration) -> Self {
        Self {
            backend,
            value: CachedValue::new(ttl),
        }
    }

    pub async fn fetch_connections(&self, force_refresh: bool) -> Result<Vec<BankConnection>, ApiError> {
        let backend = self.backend.clone();
        self.value
            .load(KIND, force_refresh, || async move { backend.list_connections().await })
            .await
    }

    /// Start a sync. Progress is followed with a `SyncPoller`, not here.
    pub async fn sync_connection(&self, connection_id: &str) -> Result<SyncTrigger, ApiError> {
        match self.backend.sync_connection(connection_id).await {
            Ok(trigger) => {
                info!("Sync requested for connection {}", connection_id);
                self.value.invalidate(KIND).await;
                Ok(trigger)
            }
            Err(err) => Err(self.value.fail(err).await),
        }
    }

    pub async fn disconnect_item(&self, connection_id: &str) -> Result<(), ApiError> {
        let connection_id = connection_id.trim();
        if let Err(err) = self.backend.disconnect(connection_id).await {
            return Err(self.value.fail(err).await);
        }
        info!("Disconnected {}", connection_id);

        self.value
            .modify_and_invalidate(KIND, |connections| connections.retain(|c| c.id != connection_id))
            .await;
        Ok(())
    }

    pub async fn connections(&self) -> Vec<BankConnection> {
        self.value.current().await
    }

    pub async fn is_loading(&self) -> bool {
        self.value.is_loading().await
    }

    pub async fn error(&self) -> Option<ApiError> {
        self.value.error().await
    }
}
