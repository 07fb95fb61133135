use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::config::Connection;
use crate::cli::utils::{output_empty_collection, output_success, output_value, print_table};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::models::BankAccount;
use crate::services::BankingService;
use crate::stores::AccountsStore;

#[derive(Subcommand)]
pub enum AccountsCommands {
    #[command(about = "List bank accounts")]
    List,

    #[command(about = "Ask the backend to sync one account")]
    Sync {
        #[arg(help = "Account id")]
        id: String,
    },
}

pub async fn handle(cmd: AccountsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let store = AccountsStore::new(
        Arc::new(BankingService::new(connection.http.clone())),
        config().cache_ttl(),
    );

    let result = run(cmd, &store, &output_format).await;
    connection.persist().await?;
    result
}

async fn run(
    cmd: AccountsCommands,
    store: &AccountsStore<BankingService>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        AccountsCommands::List => {
            let accounts = store.fetch_accounts(false).await?;
            if accounts.is_empty() {
                return output_empty_collection(output_format, "accounts", "No bank accounts connected");
            }
            output_value(output_format, "accounts", &accounts, |accounts| print_accounts(accounts))
        }
        AccountsCommands::Sync { id } => {
            let trigger = store.sync_account(&id).await?;
            let message = trigger
                .message
                .clone()
                .unwrap_or_else(|| format!("Sync requested for account {}", id));
            output_success(output_format, &message, Some(json!({ "sync": trigger })))
        }
    }
}

fn print_accounts(accounts: &[BankAccount]) {
    let rows: Vec<Vec<String>> = accounts
        .iter()
        .map(|account| {
            vec![
                account.id.clone(),
                account.display_name(),
                account.account_type.clone().unwrap_or_default(),
                format!("{} {}", account.currency_code, account.balance),
                account
                    .last_synced_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "TYPE", "BALANCE", "LAST SYNC"], &rows);
}
