use clap::Subcommand;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cli::config::Connection;
use crate::cli::utils::{output_empty_collection, output_success, output_value, print_table};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::models::BankConnection;
use crate::services::BankingService;
use crate::stores::ConnectionsStore;
use crate::sync::{PollSettings, SyncPoller, SyncStatus};
use crate::widget::{WidgetEvent, WidgetGate};

#[derive(Subcommand)]
pub enum ConnectionsCommands {
    #[command(about = "List bank connections")]
    List,

    #[command(about = "Show the current sync status of a connection")]
    Status {
        #[arg(help = "Connection id")]
        id: String,
    },

    #[command(about = "Start a sync for a connection")]
    Sync {
        #[arg(help = "Connection id")]
        id: String,
        #[arg(long, help = "Follow progress until the sync settles")]
        watch: bool,
    },

    #[command(about = "Follow an ongoing sync until it settles")]
    Watch {
        #[arg(help = "Connection id")]
        id: String,
    },

    #[command(about = "Remove a bank connection")]
    Disconnect {
        #[arg(help = "Connection id")]
        id: String,
    },

    #[command(about = "Handle a message posted by the connect widget")]
    WidgetEvent {
        #[arg(long, help = "Origin the message was posted from")]
        origin: String,
        #[arg(long, help = "Message payload as JSON")]
        data: String,
        #[arg(long, help = "Follow the sync of the connected item")]
        watch: bool,
    },
}

pub async fn handle(cmd: ConnectionsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let banking = Arc::new(BankingService::new(connection.http.clone()));

    let result = run(cmd, banking, &output_format).await;
    connection.persist().await?;
    result
}

async fn run(
    cmd: ConnectionsCommands,
    banking: Arc<BankingService>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = ConnectionsStore::new(banking.clone(), config().cache_ttl());

    match cmd {
        ConnectionsCommands::List => {
            let connections = store.fetch_connections(false).await?;
            if connections.is_empty() {
                return output_empty_collection(output_format, "connections", "No bank connections");
            }
            output_value(output_format, "connections", &connections, |c| print_connections(c))
        }
        ConnectionsCommands::Status { id } => {
            let response = banking.connection_status(&id).await?;
            let status = SyncStatus::from_response(
                &response,
                Duration::ZERO,
                PollSettings::default().timeout,
            );
            output_value(output_format, "sync_status", &status, |status| {
                println!("{}", status.message);
                if let Some(code) = status.status {
                    println!("Status: {}", code);
                }
                if let Some(execution) = status.execution_status {
                    println!("Execution: {}", execution);
                }
                if let Some(error) = &status.error_message {
                    println!("Error: {}", error);
                }
            })
        }
        ConnectionsCommands::Sync { id, watch } => {
            let trigger = store.sync_connection(&id).await?;
            if watch {
                return follow(banking, &id, output_format).await;
            }
            let message = trigger
                .message
                .clone()
                .unwrap_or_else(|| format!("Sync started for connection {}", id));
            output_success(output_format, &message, Some(json!({ "sync": trigger })))
        }
        ConnectionsCommands::Watch { id } => follow(banking, &id, output_format).await,
        ConnectionsCommands::Disconnect { id } => {
            store.disconnect_item(&id).await?;
            output_success(
                output_format,
                &format!("Connection {} removed", id),
                Some(json!({ "connection_id": id })),
            )
        }
        ConnectionsCommands::WidgetEvent { origin, data, watch } => {
            let payload: Value = serde_json::from_str(&data)
                .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {}", e))?;
            let gate = WidgetGate::new(&config().widget.allowed_origins);

            let Some(event) = gate.accept(&origin, &payload) else {
                return output_success(output_format, "Message ignored", Some(json!({ "handled": false })));
            };

            match (&event, event.connection_to_poll()) {
                (_, Some(item_id)) if watch => follow(banking, item_id, output_format).await,
                (WidgetEvent::Error { message }, _) => Err(anyhow::anyhow!("Widget reported an error: {}", message)),
                (WidgetEvent::Close, _) => output_success(output_format, "Widget closed", Some(json!({ "handled": true }))),
                (_, item_id) => output_success(
                    output_format,
                    "Widget event accepted",
                    Some(json!({ "handled": true, "connection_id": item_id })),
                ),
            }
        }
    }
}

/// Poll until the sync settles, printing progress as it changes. Ctrl-C stops polling.
async fn follow(banking: Arc<BankingService>, connection_id: &str, output_format: &OutputFormat) -> anyhow::Result<()> {
    let poller = SyncPoller::new(banking, PollSettings::from_config(config()));
    let mut updates = poller.subscribe();
    poller.start_polling(connection_id)?;

    let text = matches!(output_format, OutputFormat::Text);
    let mut last_message = String::new();

    let settled = loop {
        let status = updates.borrow_and_update().clone();
        if text && status.message != last_message && !status.message.is_empty() {
            println!("… {}", status.message);
            last_message = status.message.clone();
        }
        if !status.is_polling && status.is_terminal() {
            break status;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break poller.status();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping sync polling");
                poller.stop_polling();
                break poller.status();
            }
        }
    };

    if settled.is_complete {
        return output_success(output_format, "Sync complete", Some(json!({ "sync_status": settled })));
    }
    if !settled.has_error {
        return output_success(output_format, "Stopped watching", Some(json!({ "sync_status": settled })));
    }

    if let OutputFormat::Json = output_format {
        println!("{}", serde_json::to_string_pretty(&json!({ "success": false, "sync_status": settled }))?);
    }
    match settled.error_message {
        Some(detail) => Err(anyhow::anyhow!("{}: {}", settled.message, detail)),
        None => Err(anyhow::anyhow!("{}", settled.message)),
    }
}

fn print_connections(connections: &[BankConnection]) {
    let rows: Vec<Vec<String>> = connections
        .iter()
        .map(|c| {
            let mut status = c.status.to_string();
            if c.needs_attention() {
                status.push_str(" (!)");
            }
            vec![
                c.id.clone(),
                c.connector.name.clone(),
                status,
                c.accounts_count.to_string(),
                c.last_updated_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "BANK", "STATUS", "ACCOUNTS", "UPDATED"], &rows);
}
