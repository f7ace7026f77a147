use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use super::{decimal_column, enum_column, UnknownVariant};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpenseCategory {
    #[serde(rename = "TRANSPORT")]
    Transport,
    #[serde(rename = "ACCOMMODATION")]
    Accommodation,
    #[serde(rename = "ACTIVITY")]
    Activity,
    #[serde(rename = "MEAL")]
    Meal,
    #[serde(rename = "OTHER")]
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 5] = [
        ExpenseCategory::Transport,
        ExpenseCategory::Accommodation,
        ExpenseCategory::Activity,
        ExpenseCategory::Meal,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Transport => "TRANSPORT",
            ExpenseCategory::Accommodation => "ACCOMMODATION",
            ExpenseCategory::Activity => "ACTIVITY",
            ExpenseCategory::Meal => "MEAL",
            ExpenseCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpenseCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "expense category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub trip_id: String,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Expense {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            trip_id: row.try_get("trip_id")?,
            category: enum_column(row, "category")?,
            amount: decimal_column(row, "amount")?,
            spent_on: row.try_get("spent_on")?,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    pub note: Option<String>,
}

impl NewExpense {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.amount < Decimal::ZERO {
            return Err(AppError::BadRequest("amount must not be negative".into()));
        }
        Ok(())
    }
}

/// Ledger filter from a query string; empty parameters count as absent.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub category: Option<ExpenseCategory>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl ExpenseQuery {
    pub fn validate(&self) -> Result<(), AppError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(AppError::InvalidRange),
            _ => Ok(()),
        }
    }
}
