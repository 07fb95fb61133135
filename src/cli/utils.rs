use serde::Serialize;
use serde_json::{json, Value};
use crate::cli::OutputFormat;
use crate::error::ApiError;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an API error in the appropriate format
pub fn output_api_error(output_format: &OutputFormat, err: &ApiError) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": err.message,
                "error_code": err.error_code(),
            });
            if !err.field_errors.is_empty() {
                response["field_errors"] = json!(err.field_errors);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", err.message);
            let mut fields: Vec<_> = err.field_errors.iter().collect();
            fields.sort();
            for (field, messages) in fields {
                eprintln!("  {}: {}", field, messages.join(", "));
            }
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Print `value` as JSON, or hand it to `text` for human output
pub fn output_value<T, F>(output_format: &OutputFormat, key: &str, value: &T, text: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ key: value }))?);
        }
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Fixed-width text table
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(headers.to_vec());
    line(rule.iter().map(String::as_str).collect());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
}

/// Read a password from `--password` or the `CAIXAHUB_PASSWORD` variable
pub fn resolve_password(provided: Option<String>) -> anyhow::Result<String> {
    match provided.or_else(|| std::env::var("CAIXAHUB_PASSWORD").ok()) {
        Some(password) if !password.is_empty() => Ok(password),
        _ => Err(anyhow::anyhow!("Password required: pass --password or set CAIXAHUB_PASSWORD")),
    }
}
