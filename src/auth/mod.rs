use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Access/refresh pair issued by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

/// The only claim the client reads. Other claims are ignored.
#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

impl AuthTokens {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Expiry of the access token as a unix timestamp, if the token carries one
    pub fn access_expires_at(&self) -> Option<i64> {
        read_expiry(&self.access)
    }

    /// True when the access token expires within `window`. Opaque tokens never expire here.
    pub fn access_expires_within(&self, window: Duration) -> bool {
        match self.access_expires_at() {
            Some(exp) => exp - Utc::now().timestamp() <= window.as_secs() as i64,
            None => false,
        }
    }
}

// The client never holds the signing key, so only the payload is read.
fn read_expiry(token: &str) -> Option<i64> {
    let header = jsonwebtoken::decode_header(token).ok()?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .ok()
}

/// Session tokens shared between the HTTP client and everything built on it
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<AuthTokens>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: AuthTokens) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(tokens))),
        }
    }

    pub async fn get(&self) -> Option<AuthTokens> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, tokens: AuthTokens) {
        *self.inner.write().await = Some(tokens);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|t| t.refresh.clone())
    }

    /// Replace the access token after a refresh; rotate the refresh token when one is returned
    pub async fn update_access(&self, access: String, rotated_refresh: Option<String>) {
        let mut guard = self.inner.write().await;
        if let Some(tokens) = guard.as_mut() {
            tokens.access = access;
            if let Some(refresh) = rotated_refresh {
                tokens.refresh = refresh;
            }
        }
    }

    pub async fn access_expires_within(&self, window: Duration) -> bool {
        self.inner
            .read()
            .await
            .as_ref()
            .map_or(false, |t| t.access_expires_within(window))
    }
}
