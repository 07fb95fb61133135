use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub cache: CacheConfig,
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Refresh the access token when it expires within this many seconds
    pub refresh_skew_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub max_transient_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("CAIXAHUB_API_URL") {
            if !v.trim().is_empty() {
                self.api.base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_REFRESH_SKEW_SECS") {
            self.api.refresh_skew_secs = v.parse().unwrap_or(self.api.refresh_skew_secs);
        }

        // Polling overrides
        if let Ok(v) = env::var("SYNC_POLL_INTERVAL_MS") {
            self.polling.interval_ms = v.parse().unwrap_or(self.polling.interval_ms);
        }
        if let Ok(v) = env::var("SYNC_POLL_TIMEOUT_MS") {
            self.polling.timeout_ms = v.parse().unwrap_or(self.polling.timeout_ms);
        }
        if let Ok(v) = env::var("SYNC_POLL_MAX_RETRIES") {
            self.polling.max_transient_retries = v.parse().unwrap_or(self.polling.max_transient_retries);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_TTL_SECS") {
            self.cache.ttl_secs = v.parse().unwrap_or(self.cache.ttl_secs);
        }

        // Widget overrides
        if let Ok(v) = env::var("WIDGET_ALLOWED_ORIGINS") {
            self.widget.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
                request_timeout_secs: 30,
                refresh_skew_secs: 30,
            },
            polling: PollingConfig {
                interval_ms: 3000,
                timeout_ms: 60_000,
                max_transient_retries: 0,
            },
            cache: CacheConfig { ttl_secs: 30 },
            widget: WidgetConfig {
                allowed_origins: vec![
                    "https://connect.pluggy.ai".to_string(),
                    "http://localhost:3000".to_string(),
                ],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging-api.caixahub.com.br/api".to_string(),
                request_timeout_secs: 20,
                refresh_skew_secs: 60,
            },
            polling: PollingConfig {
                interval_ms: 3000,
                timeout_ms: 60_000,
                max_transient_retries: 0,
            },
            cache: CacheConfig { ttl_secs: 120 },
            widget: WidgetConfig {
                allowed_origins: vec!["https://connect.pluggy.ai".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://api.caixahub.com.br/api".to_string(),
                request_timeout_secs: 15,
                refresh_skew_secs: 60,
            },
            polling: PollingConfig {
                interval_ms: 3000,
                timeout_ms: 60_000,
                max_transient_retries: 0,
            },
            cache: CacheConfig { ttl_secs: 300 },
            widget: WidgetConfig {
                allowed_origins: vec!["https://connect.pluggy.ai".to_string()],
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
