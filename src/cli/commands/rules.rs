use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::config::Connection;
use crate::cli::utils::{output_api_error, output_empty_collection, output_success, output_value, print_table};
use crate::cli::OutputFormat;
use crate::models::{CategoryRule, NewRule, RuleType, RuleUpdate};
use crate::services::RulesService;

#[derive(Subcommand)]
pub enum RulesCommands {
    #[command(about = "List categorisation rules")]
    List,

    #[command(about = "Create a keyword rule")]
    Create {
        #[arg(help = "Rule name")]
        name: String,
        #[arg(long, help = "Category id to assign")]
        category: String,
        #[arg(long = "keyword", help = "Keyword to match (repeatable)")]
        keywords: Vec<String>,
        #[arg(long, help = "Raw conditions JSON instead of keywords")]
        conditions: Option<String>,
        #[arg(long, default_value = "keyword", help = "keyword, amount_range, counterpart or pattern")]
        rule_type: String,
        #[arg(long, default_value_t = 0, help = "Higher runs first")]
        priority: i32,
    },

    #[command(about = "Rename or re-prioritise a rule")]
    Update {
        #[arg(help = "Rule id")]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
    },

    #[command(about = "Enable a rule")]
    Enable {
        #[arg(help = "Rule id")]
        id: String,
    },

    #[command(about = "Disable a rule")]
    Disable {
        #[arg(help = "Rule id")]
        id: String,
    },

    #[command(about = "Delete a rule")]
    Delete {
        #[arg(help = "Rule id")]
        id: String,
    },
}

pub async fn handle(cmd: RulesCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let connection = Connection::open_authenticated()?;
    let service = RulesService::new(connection.http.clone());

    let result = run(cmd, &service, &output_format).await;
    connection.persist().await?;
    result
}

async fn run(cmd: RulesCommands, service: &RulesService, output_format: &OutputFormat) -> anyhow::Result<()> {
    match cmd {
        RulesCommands::List => {
            let rules = service.list().await?;
            if rules.is_empty() {
                return output_empty_collection(output_format, "rules", "No rules yet");
            }
            output_value(output_format, "rules", &rules, |rules| print_rules(rules))
        }
        RulesCommands::Create { name, category, keywords, conditions, rule_type, priority } => {
            let rule_type: RuleType = serde_json::from_value(Value::String(rule_type))?;
            let conditions = match conditions {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("--conditions is not valid JSON: {}", e))?,
                None => json!({ "keywords": keywords }),
            };
            let rule = NewRule {
                name,
                rule_type,
                conditions,
                category,
                priority,
                is_active: true,
            };

            match service.create(&rule).await {
                Ok(created) => output_success(
                    output_format,
                    &format!("Rule '{}' created", created.name),
                    Some(json!({ "rule": created })),
                ),
                Err(err) if !err.field_errors.is_empty() => {
                    output_api_error(output_format, &err)?;
                    Err(err.into())
                }
                Err(err) => Err(err.into()),
            }
        }
        RulesCommands::Update { id, name, category, priority } => {
            let update = RuleUpdate {
                name,
                category,
                priority,
                ..RuleUpdate::default()
            };
            let rule = service.update(&id, &update).await?;
            output_success(output_format, &format!("Rule '{}' updated", rule.name), Some(json!({ "rule": rule })))
        }
        RulesCommands::Enable { id } => {
            let rule = service.set_active(&id, true).await?;
            output_success(output_format, &format!("Rule '{}' enabled", rule.name), Some(json!({ "rule": rule })))
        }
        RulesCommands::Disable { id } => {
            let rule = service.set_active(&id, false).await?;
            output_success(output_format, &format!("Rule '{}' disabled", rule.name), Some(json!({ "rule": rule })))
        }
        RulesCommands::Delete { id } => {
            service.delete(&id).await?;
            output_success(output_format, &format!("Rule {} deleted", id), None)
        }
    }
}

fn print_rules(rules: &[CategoryRule]) {
    let rows: Vec<Vec<String>> = rules
        .iter()
        .map(|rule| {
            vec![
                rule.priority.to_string(),
                rule.name.clone(),
                format!("{:?}", rule.rule_type),
                rule.category_name.clone().unwrap_or_else(|| rule.category.clone()),
                if rule.is_active { "on" } else { "off" }.to_string(),
                rule.match_count.to_string(),
                rule.id.clone(),
            ]
        })
        .collect();
    print_table(&["PRIO", "NAME", "TYPE", "CATEGORY", "ACTIVE", "MATCHES", "ID"], &rows);
}
