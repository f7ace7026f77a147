use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{stop::StopNode, trip::Visibility};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareRecord {
    pub id: String,
    pub trip_id: String,
    pub token: String,
    pub issued_by: String,
    pub view_count: i64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareHistoryEntry {
    #[serde(flatten)]
    pub record: ShareRecord,
    /// Only the trip's latest token resolves.
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedShare {
    pub trip_id: String,
    pub token: String,
    pub visibility: Visibility,
}

/// What an anonymous visitor sees through a share link. Budget, ledger and owner
/// contact details stay private.
#[derive(Debug, Clone, Serialize)]
pub struct SharedTrip {
    pub trip_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub owner_display_name: String,
    pub stops: Vec<StopNode>,
}

impl SharedTrip {
    pub fn from_tree(tree: super::trip::TripTree, owner_display_name: String) -> Self {
        Self {
            trip_id: tree.trip.id,
            title: tree.trip.title,
            description: tree.trip.description,
            start_date: tree.trip.start_date,
            end_date: tree.trip.end_date,
            owner_display_name,
            stops: tree.stops,
        }
    }
}
