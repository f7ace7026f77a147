use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::activity::Activity;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stop {
    pub id: String,
    pub trip_id: String,
    pub city_id: String,
    pub city_name: Option<String>,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub notes: Option<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStop {
    pub city_id: String,
    pub city_name: Option<String>,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub notes: Option<String>,
    /// Exact slot to insert at; appended after the last stop when omitted.
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopPatch {
    pub city_id: Option<String>,
    pub city_name: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// A stop together with its scheduled activities in display order.
#[derive(Debug, Clone, Serialize)]
pub struct StopNode {
    #[serde(flatten)]
    pub stop: Stop,
    pub activities: Vec<Activity>,
}
