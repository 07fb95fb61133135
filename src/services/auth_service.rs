use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::auth::AuthTokens;
use crate::error::ApiError;
use crate::http::HttpClient;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: User,
    tokens: AuthTokens,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_lowercase(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut field_errors = HashMap::new();
        if !is_valid_email(&self.email) {
            field_errors.insert("email".to_string(), vec!["Enter a valid email address".to_string()]);
        }
        if self.password.is_empty() {
            field_errors.insert("password".to_string(), vec!["Password is required".to_string()]);
        }
        finish_validation(field_errors)
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut field_errors = HashMap::new();
        if !is_valid_email(&self.email) {
            field_errors.insert("email".to_string(), vec!["Enter a valid email address".to_string()]);
        }
        if self.first_name.trim().is_empty() {
            field_errors.insert("first_name".to_string(), vec!["First name is required".to_string()]);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            field_errors.insert(
                "password".to_string(),
                vec![format!("Password must be at least {} characters", MIN_PASSWORD_LEN)],
            );
        }
        if self.password != self.password2 {
            field_errors.insert("password2".to_string(), vec!["Passwords do not match".to_string()]);
        }
        finish_validation(field_errors)
    }
}

fn finish_validation(field_errors: HashMap<String, Vec<String>>) -> Result<(), ApiError> {
    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Please check the highlighted fields", field_errors))
    }
}

/// Loose shape check; the backend does the real validation
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Login, registration and session lifecycle
#[derive(Debug, Clone)]
pub struct AuthService {
    http: HttpClient,
}

impl AuthService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        request.validate()?;

        let response: AuthResponse = self.http.post_public("/auth/login", request).await?;
        self.http.tokens().set(response.tokens).await;

        info!("Logged in as {}", response.user.email);
        Ok(response.user)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        request.validate()?;

        let response: AuthResponse = self.http.post_public("/auth/register", request).await?;
        self.http.tokens().set(response.tokens).await;

        info!("Registered {}", response.user.email);
        Ok(response.user)
    }

    /// Tell the backend to revoke the refresh token, then forget the session either way
    pub async fn logout(&self) {
        if let Some(refresh) = self.http.tokens().refresh_token().await {
            let result: Result<serde::de::IgnoredAny, ApiError> =
                self.http.post("/auth/logout", &json!({ "refresh": refresh })).await;
            if let Err(err) = result {
                debug!("Logout request failed, clearing local session anyway: {}", err);
            }
        }
        self.http.tokens().clear().await;
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.http.get("/auth/profile").await
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.http.refresh().await.map(|_| ())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.http.tokens().is_authenticated().await
    }
}
