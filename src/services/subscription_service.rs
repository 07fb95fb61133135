use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::http::HttpClient;
use crate::models::{CheckoutSession, SubscriptionInfo, UsageLimits};

#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    price_id: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

/// Plan status, usage counters and the hosted billing flows
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    http: HttpClient,
}

impl SubscriptionService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn status(&self) -> Result<SubscriptionInfo, ApiError> {
        self.http.get("/subscriptions/status").await
    }

    pub async fn usage(&self) -> Result<UsageLimits, ApiError> {
        self.http.get("/subscriptions/usage").await
    }

    /// Start a hosted checkout. The caller sends the user to `checkout_url`.
    pub async fn create_checkout(
        &self,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, ApiError> {
        if price_id.trim().is_empty() {
            return Err(ApiError::invalid_input("Choose a plan first"));
        }
        for url in [success_url, cancel_url] {
            url::Url::parse(url).map_err(|_| ApiError::invalid_input(format!("Invalid redirect URL: {}", url)))?;
        }

        let request = CheckoutRequest {
            price_id: price_id.trim(),
            success_url,
            cancel_url,
        };
        self.http.post("/subscriptions/checkout", &request).await
    }

    /// Confirm a checkout after the processor redirects back
    pub async fn validate_checkout(&self, session_id: &str) -> Result<SubscriptionInfo, ApiError> {
        if session_id.trim().is_empty() {
            return Err(ApiError::invalid_input("Missing checkout session id"));
        }
        self.http
            .get_query("/subscriptions/checkout/validate", &json!({ "session_id": session_id.trim() }))
            .await
    }

    pub async fn billing_portal(&self) -> Result<PortalSession, ApiError> {
        self.http.post_empty("/subscriptions/portal").await
    }

    pub async fn cancel(&self) -> Result<SubscriptionInfo, ApiError> {
        let _: Value = self.http.post_empty("/subscriptions/cancel").await?;
        self.status().await
    }
}
