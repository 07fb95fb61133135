use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cli::config::{get_config_dir, load_session, save_session};
use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::is_production;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show effective configuration")]
    Show,

    #[command(about = "Point the CLI at another CaixaHub API")]
    SetServer {
        #[arg(help = "API base URL, e.g. http://localhost:8000/api")]
        url: String,
    },

    #[command(about = "Forget the saved server and use the configured default")]
    ResetServer,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let session = load_session()?;
            let app = config();
            let effective = json!({
                "environment": app.environment,
                "server_url": session.server_url(),
                "config_dir": get_config_dir()?.display().to_string(),
                "request_timeout_secs": app.api.request_timeout_secs,
                "poll_interval_ms": app.polling.interval_ms,
                "poll_timeout_ms": app.polling.timeout_ms,
                "cache_ttl_secs": app.cache.ttl_secs,
                "widget_allowed_origins": app.widget.allowed_origins,
            });

            output_value(&output_format, "config", &effective, |_| {
                println!("Environment: {:?}", app.environment);
                println!("Server: {}", session.server_url());
                println!("Config dir: {}", effective["config_dir"].as_str().unwrap_or_default());
                println!(
                    "Sync polling: every {}ms, give up after {}ms",
                    app.polling.interval_ms, app.polling.timeout_ms
                );
                println!("Cache TTL: {}s", app.cache.ttl_secs);
            })
        }
        ConfigCommands::SetServer { url } => {
            let parsed = Url::parse(url.trim())
                .map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
            match parsed.scheme() {
                "https" => {}
                "http" if is_production!() => {
                    anyhow::bail!("Refusing plain http server URL in production");
                }
                "http" => {}
                other => anyhow::bail!("Unsupported URL scheme '{}'", other),
            }

            let mut session = load_session()?;
            if session.server_url.as_deref() != Some(parsed.as_str()) {
                // Tokens belong to the previous server
                session.tokens = None;
                session.email = None;
            }
            session.server_url = Some(parsed.to_string());
            save_session(&session)?;

            output_success(
                &output_format,
                &format!("Server set to {}", parsed),
                Some(json!({ "server_url": parsed.as_str() })),
            )
        }
        ConfigCommands::ResetServer => {
            let mut session = load_session()?;
            if session.server_url.take().is_some() {
                session.tokens = None;
                session.email = None;
            }
            save_session(&session)?;
            output_success(
                &output_format,
                &format!("Using default server {}", config().api.base_url),
                None,
            )
        }
    }
}
