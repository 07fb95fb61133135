use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Query parameters for `GET /reports/summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl ReportQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, ApiError> {
        if end_date < start_date {
            return Err(ApiError::invalid_input("End date must be on or after the start date"));
        }
        Ok(Self {
            start_date,
            end_date,
            account_id: None,
        })
    }

    pub fn for_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    #[serde(default)]
    pub category: Option<String>,
    pub name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub income: Decimal,
    pub expenses: Decimal,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub categories: Vec<CategoryBreakdown>,
}

impl ReportSummary {
    pub fn net(&self) -> Decimal {
        self.income - self.expenses
    }

    /// Largest spending category, if any were reported
    pub fn top_category(&self) -> Option<&CategoryBreakdown> {
        self.categories.iter().max_by(|a, b| a.amount.cmp(&b.amount))
    }
}
