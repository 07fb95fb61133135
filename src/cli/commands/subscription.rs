use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::config::Connection;
use crate::cli::utils::{output_success, output_value, print_table};
use crate::cli::OutputFormat;
use crate::models::{SubscriptionInfo, UsageType};
use crate::services::SubscriptionService;
use crate::usage::{UsageTracker, WarningLevel};

#[derive(Subcommand)]
pub enum SubscriptionCommands {
    #[command(about = "Show plan and billing status")]
    Status,

    #[command(about = "Show usage against plan limits")]
    Usage,

    #[command(about = "Start a hosted checkout for a plan")]
    Checkout {
        #[arg(help = "Price id of the plan")]
        price_id: String,
        #[arg(long, help = "Redirect URL after payment")]
        success_url: String,
        #[arg(long, help = "Redirect URL when the user gives up")]
        cancel_url: String,
    },

    #[command(about = "Confirm a checkout session after the redirect")]
    Validate {
        #[arg(help = "Checkout session id")]
        session_id: String,
    },

    #[command(about = "Open the billing portal")]
    Portal,

    #[command(about = "Cancel the subscription at the end of the period")]
    Cancel,
}

pub async fn handle(cmd: SubscriptionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let service = SubscriptionService::new(connection.http.clone());

    let result = run(cmd, &service, &output_format).await;
    connection.persist().await?;
    result
}

async fn run(cmd: SubscriptionCommands, service: &SubscriptionService, output_format: &OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SubscriptionCommands::Status => {
            let info = service.status().await?;
            output_value(output_format, "subscription", &info, print_subscription)
        }
        SubscriptionCommands::Usage => {
            let limits = service.usage().await?;
            let tracker = UsageTracker::new(Some(limits));

            let summary: Vec<_> = UsageType::ALL
                .iter()
                .map(|usage_type| {
                    let item = tracker.limits().and_then(|limits| limits.get(*usage_type));
                    json!({
                        "type": usage_type,
                        "used": item.map(|i| i.used),
                        "limit": item.map(|i| i.limit),
                        "percentage": tracker.usage_percentage(*usage_type),
                        "limit_reached": tracker.is_usage_limit_reached(*usage_type),
                        "warning": tracker.warning_level(*usage_type),
                    })
                })
                .collect();

            output_value(output_format, "usage", &summary, |_| print_usage(&tracker))
        }
        SubscriptionCommands::Checkout { price_id, success_url, cancel_url } => {
            let session = service.create_checkout(&price_id, &success_url, &cancel_url).await?;
            output_success(
                output_format,
                &format!("Complete payment at {}", session.checkout_url),
                Some(json!({ "checkout": session })),
            )
        }
        SubscriptionCommands::Validate { session_id } => {
            let info = service.validate_checkout(&session_id).await?;
            if !info.is_active() {
                anyhow::bail!("Checkout not confirmed, subscription is {:?}", info.status);
            }
            output_success(output_format, "Subscription active", Some(json!({ "subscription": info })))
        }
        SubscriptionCommands::Portal => {
            let portal = service.billing_portal().await?;
            output_success(
                output_format,
                &format!("Manage billing at {}", portal.url),
                Some(json!({ "portal_url": portal.url })),
            )
        }
        SubscriptionCommands::Cancel => {
            let info = service.cancel().await?;
            let message = match info.current_period_end {
                Some(end) if info.cancel_at_period_end => format!("Subscription ends on {}", end.format("%Y-%m-%d")),
                _ => "Subscription canceled".to_string(),
            };
            output_success(output_format, &message, Some(json!({ "subscription": info })))
        }
    }
}

fn print_subscription(info: &SubscriptionInfo) {
    let plan = info.plan.as_ref().map_or("none", |plan| plan.name.as_str());
    println!("Plan: {}", plan);
    println!("Status: {:?}", info.status);
    if info.is_trial() {
        println!("Trial days left: {}", info.trial_days_remaining(Utc::now()));
    }
    if info.requires_payment() {
        println!("Payment required: run 'caixa subscription portal' to update billing");
    }
    if let Some(end) = info.current_period_end {
        let verb = if info.cancel_at_period_end { "Ends" } else { "Renews" };
        println!("{}: {}", verb, end.format("%Y-%m-%d"));
    }
}

fn print_usage(tracker: &UsageTracker) {
    let rows: Vec<Vec<String>> = UsageType::ALL
        .iter()
        .map(|usage_type| {
            let item = tracker.limits().and_then(|limits| limits.get(*usage_type));
            vec![
                usage_type.label().to_string(),
                item.map_or("-".to_string(), |i| format!("{}/{}", i.used, i.limit)),
                format!("{:.0}%", tracker.usage_percentage(*usage_type)),
            ]
        })
        .collect();
    print_table(&["USAGE", "USED", "PERCENT"], &rows);

    for (usage_type, level) in tracker.warnings() {
        match level {
            WarningLevel::Critical => println!("! {} limit reached, upgrade to keep going", usage_type.label()),
            _ => println!("! {} is close to the plan limit", usage_type.label()),
        }
    }
}
