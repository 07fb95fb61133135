use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bank or credit-card account discovered through a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    pub balance: Decimal,
    #[serde(default = "default_currency")]
    pub currency_code: String,
    #[serde(default)]
    pub institution_name: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "BRL".to_string()
}

fn default_true() -> bool {
    true
}

impl BankAccount {
    /// Name shown in listings, prefixed with the institution when known
    pub fn display_name(&self) -> String {
        match &self.institution_name {
            Some(institution) if !institution.is_empty() => format!("{} - {}", institution, self.name),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minimal_account_with_defaults() {
        let account: BankAccount = serde_json::from_value(json!({
            "id": "acc_1",
            "name": "Conta Corrente",
            "balance": "1520.75"
        }))
        .unwrap();

        assert_eq!(account.currency_code, "BRL");
        assert!(account.is_active);
        assert_eq!(account.balance, Decimal::new(152075, 2));
        assert_eq!(account.display_name(), "Conta Corrente");
    }

    #[test]
    fn display_name_includes_institution() {
        let account: BankAccount = serde_json::from_value(json!({
            "id": "acc_2",
            "name": "Cartao",
            "type": "CREDIT",
            "balance": 0,
            "institution_name": "Nubank"
        }))
        .unwrap();

        assert_eq!(account.account_type.as_deref(), Some("CREDIT"));
        assert_eq!(account.display_name(), "Nubank - Cartao");
    }
}
