use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        share::{IssuedShare, ShareHistoryEntry, ShareRecord, SharedTrip},
        trip::{Trip, TripTree, Visibility},
    },
    services::itinerary::load_stop_nodes,
};

/// Owners always read their trips; everyone else only when the trip is not PRIVATE.
pub fn can_read(trip: &Trip, caller_id: Option<&str>) -> bool {
    if caller_id.is_some_and(|id| trip.is_owned_by(id)) {
        return true;
    }
    trip.visibility != Visibility::Private
}

/// Hex-encoded bytes from the operating system's CSPRNG.
pub fn generate_share_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// PRIVATE / SHARED / PUBLIC transitions, share links and their view counters.
#[derive(Clone)]
pub struct VisibilityGate {
    db: DbPool,
    token_bytes: usize,
}

impl VisibilityGate {
    pub fn new(db: DbPool, token_bytes: usize) -> Self {
        Self { db, token_bytes }
    }

    /// Issues a fresh token and makes the trip SHARED. Any previous token stops
    /// resolving; its record is kept as history. A token collision surfaces as
    /// `Conflict` and the whole issuance is rolled back.
    pub async fn issue_share(&self, trip_id: &str, owner_id: &str) -> Result<IssuedShare, AppError> {
        let token = generate_share_token(self.token_bytes);
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE trips SET visibility = ?1, share_token = ?2, updated_at = ?3 WHERE id = ?4 AND owner_id = ?5",
        )
        .bind(Visibility::Shared.as_str())
        .bind(&token)
        .bind(Utc::now())
        .bind(trip_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_unique_violation)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        sqlx::query(
            r#"INSERT INTO share_records (id, trip_id, token, issued_by, view_count, issued_at)
               VALUES (?1, ?2, ?3, ?4, 0, ?5)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(trip_id)
        .bind(&token)
        .bind(owner_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_unique_violation)?;
        tx.commit().await?;

        Ok(IssuedShare {
            trip_id: trip_id.to_string(),
            token,
            visibility: Visibility::Shared,
        })
    }

    /// Counts one view and returns the public tree, or `NotFound` unless the token
    /// is the trip's current one and the trip is SHARED right now. The count and the
    /// returned tree commit together: a view is only counted when it is served.
    pub async fn resolve_shared(&self, token: &str) -> Result<SharedTrip, AppError> {
        let mut tx = self.db.begin().await?;
        // The guarded increment goes first so the write lock is held for the reads.
        let counted = sqlx::query(
            r#"UPDATE share_records SET view_count = view_count + 1
               WHERE token = ?1
                 AND EXISTS (
                     SELECT 1 FROM trips
                     WHERE trips.id = share_records.trip_id
                       AND trips.share_token = share_records.token
                       AND trips.visibility = ?2
                 )"#,
        )
        .bind(token)
        .bind(Visibility::Shared.as_str())
        .execute(&mut *tx)
        .await?;
        if counted.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE share_token = ?1")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;
        let owner_display_name: String =
            sqlx::query_scalar("SELECT display_name FROM users WHERE id = ?1")
                .bind(&trip.owner_id)
                .fetch_one(&mut *tx)
                .await?;
        let stops = load_stop_nodes(&mut tx, &trip.id).await?;
        tx.commit().await?;

        Ok(SharedTrip::from_tree(
            TripTree { trip, stops },
            owner_display_name,
        ))
    }

    /// Explicit owner transition. Going back to SHARED reuses the last issued token;
    /// a trip that was never shared has to go through `issue_share`.
    pub async fn set_visibility(
        &self,
        trip_id: &str,
        visibility: Visibility,
    ) -> Result<Trip, AppError> {
        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"UPDATE trips SET visibility = ?1, updated_at = ?2
               WHERE id = ?3 AND (?1 != ?4 OR share_token IS NOT NULL)"#,
        )
        .bind(visibility.as_str())
        .bind(Utc::now())
        .bind(trip_id)
        .bind(Visibility::Shared.as_str())
        .execute(&mut *tx)
        .await?;
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?1")
            .bind(trip_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::BadRequest(
                "trip has no share token yet; issue a share link instead".into(),
            ));
        }
        tx.commit().await?;
        Ok(trip)
    }

    pub async fn share_history(&self, trip_id: &str) -> Result<Vec<ShareHistoryEntry>, AppError> {
        let current: Option<Option<String>> =
            sqlx::query_scalar("SELECT share_token FROM trips WHERE id = ?1")
                .bind(trip_id)
                .fetch_optional(&self.db)
                .await?;
        let current = current.ok_or(AppError::NotFound)?;
        let records = sqlx::query_as::<_, ShareRecord>(
            "SELECT * FROM share_records WHERE trip_id = ?1 ORDER BY issued_at DESC, id",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(records
            .into_iter()
            .map(|record| ShareHistoryEntry {
                current: current.as_deref() == Some(record.token.as_str()),
                record,
            })
            .collect())
    }
}
