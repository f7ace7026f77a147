use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use super::decimal_column;
use crate::error::AppError;

pub const MAX_QUERY_LIMIT: i64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    /// The user who created the activity; only their trips can schedule it.
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub city_id: Option<String>,
    pub cost: Decimal,
    pub duration_minutes: i64,
    /// `None` for pool activities.
    pub stop_id: Option<String>,
    pub position: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn is_assigned(&self) -> bool {
        self.stop_id.is_some()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Activity {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            city_id: row.try_get("city_id")?,
            cost: decimal_column(row, "cost")?,
            duration_minutes: row.try_get("duration_minutes")?,
            stop_id: row.try_get("stop_id")?,
            position: row.try_get("position")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub name: String,
    pub description: Option<String>,
    pub city_id: Option<String>,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub duration_minutes: i64,
}

impl NewActivity {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("activity name is required".into()));
        }
        if self.cost < Decimal::ZERO {
            return Err(AppError::BadRequest("cost must not be negative".into()));
        }
        if self.duration_minutes < 0 {
            return Err(AppError::BadRequest("duration must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignActivity {
    pub activity_id: String,
    pub position: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Filter for the activity catalog. Every field is optional; validate before use.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub city_id: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub unassigned_only: bool,
    pub max_cost: Option<Decimal>,
    pub limit: Option<i64>,
}

impl ActivityQuery {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.unassigned_only && self.stop_id.is_some() {
            return Err(AppError::BadRequest(
                "stop_id and unassigned_only are mutually exclusive".into(),
            ));
        }
        if let Some(max_cost) = self.max_cost {
            if max_cost < Decimal::ZERO {
                return Err(AppError::BadRequest("max_cost must not be negative".into()));
            }
        }
        if let Some(limit) = self.limit {
            if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
                return Err(AppError::BadRequest(format!(
                    "limit must be between 1 and {MAX_QUERY_LIMIT}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_rejects_contradictory_filters() {
        let query = ActivityQuery {
            stop_id: Some("s1".into()),
            unassigned_only: true,
            ..Default::default()
        };
        assert!(matches!(query.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn query_limit_is_bounded() {
        let mut query = ActivityQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(query.validate().is_err());
        query.limit = Some(MAX_QUERY_LIMIT);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn negative_cost_is_rejected() {
        let activity = NewActivity {
            name: "Louvre".into(),
            description: None,
            city_id: None,
            cost: Decimal::from(-5),
            duration_minutes: 120,
        };
        assert!(activity.validate().is_err());
    }
}
