use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::config::Connection;
use crate::cli::utils::{output_empty_collection, output_success, output_value, print_table};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::http::Page;
use crate::models::{Transaction, TransactionFilter, TransactionUpdate};
use crate::services::BankingService;
use crate::stores::TransactionsStore;

#[derive(Subcommand)]
pub enum TransactionsCommands {
    #[command(about = "List transactions")]
    List {
        #[arg(long, help = "Only this account")]
        account: Option<String>,
        #[arg(long, help = "Only this category")]
        category: Option<String>,
        #[arg(long, help = "From date (YYYY-MM-DD)")]
        from: Option<NaiveDate>,
        #[arg(long, help = "To date (YYYY-MM-DD)")]
        to: Option<NaiveDate>,
        #[arg(long, help = "Search in descriptions")]
        search: Option<String>,
        #[arg(long, help = "Page number")]
        page: Option<u32>,
        #[arg(long, help = "Page size")]
        page_size: Option<u32>,
    },

    #[command(about = "Change category, description or notes of a transaction")]
    Update {
        #[arg(help = "Transaction id")]
        id: String,
        #[arg(long, help = "New category id")]
        category: Option<String>,
        #[arg(long, help = "New description")]
        description: Option<String>,
        #[arg(long, help = "Notes")]
        notes: Option<String>,
    },
}

pub async fn handle(cmd: TransactionsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let store = TransactionsStore::new(
        Arc::new(BankingService::new(connection.http.clone())),
        config().cache_ttl(),
    );

    let result = run(cmd, &store, &output_format).await;
    connection.persist().await?;
    result
}

async fn run(
    cmd: TransactionsCommands,
    store: &TransactionsStore<BankingService>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        TransactionsCommands::List { account, category, from, to, search, page, page_size } => {
            if let (Some(from), Some(to)) = (from, to) {
                if to < from {
                    anyhow::bail!("--to must not be before --from");
                }
            }
            let filter = TransactionFilter {
                account_id: account,
                category,
                start_date: from,
                end_date: to,
                search,
                page,
                page_size,
            };

            let page = store.fetch_transactions(&filter, false).await?;
            if page.results.is_empty() {
                return output_empty_collection(output_format, "transactions", "No transactions found");
            }
            output_value(output_format, "transactions", &page, print_page)
        }
        TransactionsCommands::Update { id, category, description, notes } => {
            let update = TransactionUpdate { category, description, notes };
            if update.is_empty() {
                anyhow::bail!("Nothing to update: pass --category, --description or --notes");
            }

            let updated = store.update_transaction(&id, &update).await?;
            output_success(
                output_format,
                &format!("Transaction {} updated", updated.id),
                Some(json!({ "transaction": updated })),
            )
        }
    }
}

fn print_page(page: &Page<Transaction>) {
    let rows: Vec<Vec<String>> = page
        .results
        .iter()
        .map(|tx| {
            vec![
                tx.date.format("%Y-%m-%d").to_string(),
                tx.description.clone(),
                tx.amount.to_string(),
                tx.category_name.clone().or_else(|| tx.category.clone()).unwrap_or_default(),
                tx.id.clone(),
            ]
        })
        .collect();
    print_table(&["DATE", "DESCRIPTION", "AMOUNT", "CATEGORY", "ID"], &rows);

    if page.has_next() {
        println!("\nShowing {} of {} transactions, use --page for more", page.results.len(), page.count);
    }
}
