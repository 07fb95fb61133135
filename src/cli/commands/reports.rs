use chrono::{Datelike, NaiveDate, Utc};
use clap::Subcommand;

use crate::cli::config::Connection;
use crate::cli::utils::{output_value, print_table};
use crate::cli::OutputFormat;
use crate::models::{ReportQuery, ReportSummary};
use crate::services::ReportsService;

#[derive(Subcommand)]
pub enum ReportsCommands {
    #[command(about = "Income, expenses and spending by category")]
    Summary {
        #[arg(long, help = "From date (YYYY-MM-DD), defaults to the first day of this month")]
        from: Option<NaiveDate>,
        #[arg(long, help = "To date (YYYY-MM-DD), defaults to today")]
        to: Option<NaiveDate>,
        #[arg(long, help = "Only this account")]
        account: Option<String>,
    },
}

pub async fn handle(cmd: ReportsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let service = ReportsService::new(connection.http.clone());

    let result = match cmd {
        ReportsCommands::Summary { from, to, account } => {
            let today = Utc::now().date_naive();
            let start = from.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
            let mut query = ReportQuery::new(start, to.unwrap_or(today))?;
            if let Some(account) = account {
                query = query.for_account(account);
            }

            match service.summary(&query).await {
                Ok(summary) => output_value(&output_format, "report", &summary, print_summary),
                Err(err) => Err(err.into()),
            }
        }
    };

    connection.persist().await?;
    result
}

fn print_summary(summary: &ReportSummary) {
    println!("Period: {} to {}", summary.period_start, summary.period_end);
    println!("Income:   {}", summary.income);
    println!("Expenses: {}", summary.expenses);
    println!("Net:      {}", summary.net());
    println!("Transactions: {}", summary.transaction_count);

    if summary.categories.is_empty() {
        return;
    }
    println!();
    let rows: Vec<Vec<String>> = summary
        .categories
        .iter()
        .map(|c| vec![c.name.clone(), c.amount.to_string(), format!("{:.1}%", c.percentage), c.count.to_string()])
        .collect();
    print_table(&["CATEGORY", "AMOUNT", "SHARE", "COUNT"], &rows);
}
