use reqwest::{Method, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenStore;
use crate::config::AppConfig;
use crate::error::{ApiError, ErrorKind};

pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub refresh_skew: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            refresh_skew: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            request_timeout: config.request_timeout(),
            refresh_skew: Duration::from_secs(config.api.refresh_skew_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Authenticated JSON client for the CaixaHub backend
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: Url,
    refresh_skew: Duration,
    tokens: TokenStore,
    refresh_lock: Arc<Mutex<()>>,
}

impl HttpClient {
    pub fn new(settings: ClientSettings, tokens: TokenStore) -> Result<Self, ApiError> {
        let base_url = Url::parse(settings.base_url.trim()).map_err(|e| {
            ApiError::invalid_input(format!("Invalid API URL '{}': {}", settings.base_url, e))
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::invalid_input(format!(
                "API URL must be http(s): {}",
                settings.base_url
            )));
        }

        let inner = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("caixa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner,
            base_url,
            refresh_skew: settings.refresh_skew,
            tokens,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL, keeping the base path prefix
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ApiError::invalid_input(format!("Invalid request path '{}': {}", path, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, Vec::new(), None).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let query = query_pairs(serde_json::to_value(query)?);
        self.execute(Method::GET, path, query, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, path, Vec::new(), Some(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::POST, path, Vec::new(), None).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::PATCH, path, Vec::new(), Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self.execute(Method::DELETE, path, Vec::new(), None).await?;
        Ok(())
    }

    /// POST without credentials, for login/registration
    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        let response = self.dispatch(&Method::POST, path, &[], Some(&body), None).await?;
        decode_response(response).await
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let refresh = self
            .tokens
            .refresh_token()
            .await
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        let body = json!({ "refresh": refresh });
        let response = self.dispatch(&Method::POST, REFRESH_PATH, &[], Some(&body), None).await?;
        let refreshed: RefreshResponse = decode_response(response).await?;

        self.tokens.update_access(refreshed.access.clone(), refreshed.refresh).await;
        debug!("Access token refreshed");
        Ok(refreshed.access)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        self.refresh_if_expiring().await;

        let access = self.tokens.access_token().await;
        let response = self
            .dispatch(&method, path, &query, body.as_ref(), access.as_deref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(stale) = access {
                debug!("{} {} returned 401, refreshing session", method, path);
                let fresh = self.refresh_after_unauthorized(&stale).await?;
                let retry = self
                    .dispatch(&method, path, &query, body.as_ref(), Some(&fresh))
                    .await?;
                return decode_response(retry).await;
            }
        }

        decode_response(response).await
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        access: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let mut request = self.inner.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = access {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    // Proactive refresh; failures fall through to the 401 path
    async fn refresh_if_expiring(&self) {
        if !self.tokens.access_expires_within(self.refresh_skew).await {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.tokens.access_expires_within(self.refresh_skew).await {
            return;
        }
        if let Err(err) = self.refresh().await {
            debug!("Proactive token refresh failed: {}", err);
        }
    }

    async fn refresh_after_unauthorized(&self, stale: &str) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        // Another request may have refreshed while this one waited
        match self.tokens.access_token().await {
            Some(current) if current != stale => return Ok(current),
            None => return Err(ApiError::unauthorized("Session expired, please log in again")),
            _ => {}
        }

        match self.refresh().await {
            Ok(access) => Ok(access),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                warn!("Token refresh rejected ({}), clearing session", err);
                self.tokens.clear().await;
                Err(ApiError::unauthorized("Session expired, please log in again"))
            }
        }
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body = serde_json::from_slice::<Value>(&bytes).ok().or_else(|| {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            // HTML error pages make poor messages
            if text.is_empty() || text.starts_with('<') {
                None
            } else {
                Some(Value::String(text))
            }
        });
        let err = ApiError::from_response(status.as_u16(), body);
        if err.kind == ErrorKind::Server {
            warn!("Server error {}: {}", status, err.message);
        }
        return Err(err);
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Flatten a serialized query struct into key/value pairs, dropping nulls
fn query_pairs(value: Value) -> Vec<(String, String)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}
