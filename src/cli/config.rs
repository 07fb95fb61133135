use std::fs;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthTokens, TokenStore};
use crate::config::config;
use crate::http::{ClientSettings, HttpClient};

/// What the CLI remembers between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliSession {
    pub server_url: Option<String>,
    pub email: Option<String>,
    pub tokens: Option<AuthTokens>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CliSession {
    /// Server chosen with `caixa config set-server`, else the configured API URL
    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .unwrap_or_else(|| config().api.base_url.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.is_some()
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CAIXAHUB_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("caixahub").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<CliSession> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(CliSession::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: CliSession = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session(session: &CliSession) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let mut session = session.clone();
    session.updated_at = Some(Utc::now());

    let content = serde_json::to_string_pretty(&session)?;
    fs::write(session_file, content)?;
    Ok(())
}

/// HTTP client for the saved session, plus the session it was built from
pub struct Connection {
    pub http: HttpClient,
    pub session: CliSession,
}

impl Connection {
    pub fn open() -> anyhow::Result<Self> {
        let session = load_session()?;
        let mut settings = ClientSettings::from_config(config());
        settings.base_url = session.server_url();

        let tokens = match session.tokens.clone() {
            Some(tokens) => TokenStore::with_tokens(tokens),
            None => TokenStore::new(),
        };
        let http = HttpClient::new(settings, tokens)?;
        Ok(Self { http, session })
    }

    /// Fail early with a friendly message when there is no saved login
    pub fn open_authenticated() -> anyhow::Result<Self> {
        let connection = Self::open()?;
        if !connection.session.is_logged_in() {
            anyhow::bail!("Not logged in. Run 'caixa auth login <email>' first");
        }
        Ok(connection)
    }

    /// Write back tokens the client refreshed or cleared during this run
    pub async fn persist(&self) -> anyhow::Result<()> {
        let current = self.http.tokens().get().await;
        if current == self.session.tokens {
            return Ok(());
        }

        debug!("Session tokens changed, saving");
        let mut session = self.session.clone();
        session.tokens = current;
        if session.tokens.is_none() {
            session.email = None;
        }
        save_session(&session)
    }
}
