pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "caixa")]
#[command(about = "CaixaHub CLI - accounts, transactions and bank sync from the terminal")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show or change CLI configuration")]
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },

    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Bank accounts")]
    Accounts {
        #[command(subcommand)]
        cmd: commands::accounts::AccountsCommands,
    },

    #[command(about = "Transactions")]
    Transactions {
        #[command(subcommand)]
        cmd: commands::transactions::TransactionsCommands,
    },

    #[command(about = "Bank connections and sync progress")]
    Connections {
        #[command(subcommand)]
        cmd: commands::connections::ConnectionsCommands,
    },

    #[command(about = "Plan, billing and usage limits")]
    Subscription {
        #[command(subcommand)]
        cmd: commands::subscription::SubscriptionCommands,
    },

    #[command(about = "Categorisation rules")]
    Rules {
        #[command(subcommand)]
        cmd: commands::rules::RulesCommands,
    },

    #[command(about = "Financial reports")]
    Reports {
        #[command(subcommand)]
        cmd: commands::reports::ReportsCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Config { cmd } => commands::config::handle(cmd, output_format).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Accounts { cmd } => commands::accounts::handle(cmd, output_format).await,
        Commands::Transactions { cmd } => commands::transactions::handle(cmd, output_format).await,
        Commands::Connections { cmd } => commands::connections::handle(cmd, output_format).await,
        Commands::Subscription { cmd } => commands::subscription::handle(cmd, output_format).await,
        Commands::Rules { cmd } => commands::rules::handle(cmd, output_format).await,
        Commands::Reports { cmd } => commands::reports::handle(cmd, output_format).await,
    }
}
