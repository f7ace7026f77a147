use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        activity::{Activity, AssignActivity},
        normalize_optional,
        stop::{NewStop, Stop, StopNode, StopPatch},
        trip::{Trip, TripTree},
    },
    services::ordering::OrderedCollection,
};

/// Structural operations over trip → stops → activities.
///
/// Every mutation runs in one transaction whose first statement bumps the trip's
/// `updated_at`. That write takes SQLite's write lock before any sibling position is
/// read, so concurrent appends to one scope are serialized. Callers must already have
/// established write authority over the trip.
#[derive(Clone)]
pub struct ItineraryTree {
    db: DbPool,
}

impl ItineraryTree {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn add_stop(&self, trip_id: &str, new: NewStop) -> Result<Stop, AppError> {
        if new.arrival_date > new.departure_date {
            return Err(AppError::InvalidRange);
        }
        let city_id = new.city_id.trim().to_string();
        if city_id.is_empty() {
            return Err(AppError::BadRequest("city_id is required".into()));
        }

        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        let position = OrderedCollection::stops_of(trip_id)
            .insert_at(&mut tx, new.position)
            .await?;
        let stop = Stop {
            id: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            city_id,
            city_name: normalize_optional(new.city_name),
            arrival_date: new.arrival_date,
            departure_date: new.departure_date,
            notes: normalize_optional(new.notes),
            position,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"INSERT INTO stops (id, trip_id, city_id, city_name, arrival_date, departure_date, notes, position, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        )
        .bind(&stop.id)
        .bind(&stop.trip_id)
        .bind(&stop.city_id)
        .bind(&stop.city_name)
        .bind(stop.arrival_date)
        .bind(stop.departure_date)
        .bind(&stop.notes)
        .bind(stop.position)
        .bind(stop.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(stop)
    }

    pub async fn update_stop(
        &self,
        trip_id: &str,
        stop_id: &str,
        patch: StopPatch,
    ) -> Result<Stop, AppError> {
        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        let mut stop = fetch_stop(&mut tx, trip_id, stop_id).await?;

        if let Some(city_id) = patch.city_id {
            let city_id = city_id.trim().to_string();
            if city_id.is_empty() {
                return Err(AppError::BadRequest("city_id is required".into()));
            }
            stop.city_id = city_id;
        }
        if patch.city_name.is_some() {
            stop.city_name = normalize_optional(patch.city_name);
        }
        if patch.notes.is_some() {
            stop.notes = normalize_optional(patch.notes);
        }
        stop.arrival_date = patch.arrival_date.unwrap_or(stop.arrival_date);
        stop.departure_date = patch.departure_date.unwrap_or(stop.departure_date);
        if stop.arrival_date > stop.departure_date {
            return Err(AppError::InvalidRange);
        }

        sqlx::query(
            r#"UPDATE stops SET city_id = ?1, city_name = ?2, arrival_date = ?3, departure_date = ?4, notes = ?5
               WHERE id = ?6"#,
        )
        .bind(&stop.city_id)
        .bind(&stop.city_name)
        .bind(stop.arrival_date)
        .bind(stop.departure_date)
        .bind(&stop.notes)
        .bind(&stop.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(stop)
    }

    /// Deletes the stop together with every activity scheduled at it.
    pub async fn remove_stop(&self, trip_id: &str, stop_id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        fetch_stop(&mut tx, trip_id, stop_id).await?;
        sqlx::query("DELETE FROM activities WHERE stop_id = ?1")
            .bind(stop_id)
            .execute(&mut *tx)
            .await?;
        OrderedCollection::stops_of(trip_id)
            .remove(&mut tx, stop_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn reorder_stop(
        &self,
        trip_id: &str,
        stop_id: &str,
        new_position: i64,
    ) -> Result<Stop, AppError> {
        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        OrderedCollection::stops_of(trip_id)
            .reorder(&mut tx, stop_id, new_position)
            .await?;
        let stop = fetch_stop(&mut tx, trip_id, stop_id).await?;
        tx.commit().await?;
        Ok(stop)
    }

    /// Schedules an activity at a stop of this trip. A pool activity is pulled in;
    /// one already scheduled elsewhere in the same trip is moved. Activities created
    /// by another user are a `ScopeMismatch`.
    pub async fn assign_activity(
        &self,
        trip_id: &str,
        stop_id: &str,
        assignment: AssignActivity,
    ) -> Result<Activity, AppError> {
        check_schedule(assignment.start_time, assignment.end_time)?;

        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        OrderedCollection::stops_of(trip_id)
            .ensure_member(&mut tx, stop_id)
            .await?;

        let placement = activity_placement(&mut tx, &assignment.activity_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let trip_owner: String = sqlx::query_scalar("SELECT owner_id FROM trips WHERE id = ?1")
            .bind(trip_id)
            .fetch_one(&mut *tx)
            .await?;
        if placement.owner_id != trip_owner {
            return Err(AppError::ScopeMismatch);
        }
        if let Some(current_stop) = placement.stop_id.as_deref() {
            if placement.trip_id.as_deref() != Some(trip_id) {
                return Err(AppError::ScopeMismatch);
            }
            OrderedCollection::activities_of(current_stop)
                .remove(&mut tx, &assignment.activity_id)
                .await?;
        }

        OrderedCollection::activities_of(stop_id)
            .attach(&mut tx, &assignment.activity_id, assignment.position)
            .await?;
        sqlx::query("UPDATE activities SET start_time = ?1, end_time = ?2 WHERE id = ?3")
            .bind(assignment.start_time)
            .bind(assignment.end_time)
            .bind(&assignment.activity_id)
            .execute(&mut *tx)
            .await?;
        let activity = fetch_activity(&mut tx, &assignment.activity_id).await?;
        tx.commit().await?;
        Ok(activity)
    }

    /// Returns a scheduled activity to the pool: no stop, no times, position 0.
    pub async fn unassign_activity(
        &self,
        trip_id: &str,
        activity_id: &str,
    ) -> Result<Activity, AppError> {
        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        let placement = activity_placement(&mut tx, activity_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let stop_id = match (placement.stop_id, placement.trip_id) {
            (Some(stop_id), Some(owner)) if owner == trip_id => stop_id,
            _ => return Err(AppError::NotFound),
        };
        OrderedCollection::activities_of(&stop_id)
            .remove(&mut tx, activity_id)
            .await?;
        let activity = fetch_activity(&mut tx, activity_id).await?;
        tx.commit().await?;
        Ok(activity)
    }

    pub async fn reorder_activity(
        &self,
        trip_id: &str,
        activity_id: &str,
        new_position: i64,
    ) -> Result<Activity, AppError> {
        let mut tx = self.db.begin().await?;
        touch_trip(&mut tx, trip_id).await?;
        let placement = activity_placement(&mut tx, activity_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let stop_id = match (placement.stop_id, placement.trip_id) {
            (Some(stop_id), Some(owner)) if owner == trip_id => stop_id,
            (Some(_), _) => return Err(AppError::ScopeMismatch),
            (None, _) => return Err(AppError::NotFound),
        };
        OrderedCollection::activities_of(&stop_id)
            .reorder(&mut tx, activity_id, new_position)
            .await?;
        let activity = fetch_activity(&mut tx, activity_id).await?;
        tx.commit().await?;
        Ok(activity)
    }

    pub async fn load_tree(&self, trip_id: &str) -> Result<TripTree, AppError> {
        let mut conn = self.db.acquire().await?;
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?1")
            .bind(trip_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(AppError::NotFound)?;
        let stops = load_stop_nodes(&mut conn, trip_id).await?;
        Ok(TripTree { trip, stops })
    }

    /// Activities currently scheduled at any stop of the trip. Pool items are excluded.
    pub async fn assigned_activities(&self, trip_id: &str) -> Result<Vec<Activity>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"SELECT a.* FROM activities a
               JOIN stops s ON s.id = a.stop_id
               WHERE s.trip_id = ?1
               ORDER BY s.position, a.position, a.id"#,
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(activities)
    }
}

pub(crate) async fn load_stop_nodes(
    conn: &mut SqliteConnection,
    trip_id: &str,
) -> Result<Vec<StopNode>, AppError> {
    let stops = sqlx::query_as::<_, Stop>(
        "SELECT * FROM stops WHERE trip_id = ?1 ORDER BY position, id",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await?;
    let activities = sqlx::query_as::<_, Activity>(
        r#"SELECT a.* FROM activities a
           JOIN stops s ON s.id = a.stop_id
           WHERE s.trip_id = ?1
           ORDER BY a.position, a.id"#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_stop: HashMap<String, Vec<Activity>> = HashMap::new();
    for activity in activities {
        if let Some(stop_id) = activity.stop_id.clone() {
            by_stop.entry(stop_id).or_default().push(activity);
        }
    }
    Ok(stops
        .into_iter()
        .map(|stop| {
            let activities = by_stop.remove(&stop.id).unwrap_or_default();
            StopNode { stop, activities }
        })
        .collect())
}

async fn touch_trip(conn: &mut SqliteConnection, trip_id: &str) -> Result<(), AppError> {
    let touched = sqlx::query("UPDATE trips SET updated_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(trip_id)
        .execute(conn)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

async fn fetch_stop(
    conn: &mut SqliteConnection,
    trip_id: &str,
    stop_id: &str,
) -> Result<Stop, AppError> {
    sqlx::query_as::<_, Stop>("SELECT * FROM stops WHERE id = ?1 AND trip_id = ?2")
        .bind(stop_id)
        .bind(trip_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn fetch_activity(conn: &mut SqliteConnection, activity_id: &str) -> Result<Activity, AppError> {
    sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = ?1")
        .bind(activity_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound)
}

#[derive(sqlx::FromRow)]
struct Placement {
    owner_id: String,
    stop_id: Option<String>,
    trip_id: Option<String>,
}

/// Who created an activity and where it currently sits: its stop and that stop's
/// trip, both `None` for a pool item.
async fn activity_placement(
    conn: &mut SqliteConnection,
    activity_id: &str,
) -> Result<Option<Placement>, AppError> {
    let placement = sqlx::query_as::<_, Placement>(
        r#"SELECT a.owner_id AS owner_id, a.stop_id AS stop_id, s.trip_id AS trip_id
           FROM activities a LEFT JOIN stops s ON s.id = a.stop_id
           WHERE a.id = ?1"#,
    )
    .bind(activity_id)
    .fetch_optional(conn)
    .await?;
    Ok(placement)
}

fn check_schedule(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(AppError::InvalidRange),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::testing::{test_db, TestDb};
    use crate::models::{activity::NewActivity, trip::NewTrip, user::NewUser};
    use crate::services::trips::TripStore;

    struct Fixture {
        db: TestDb,
        tree: ItineraryTree,
        store: TripStore,
        owner_id: String,
        trip_id: String,
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn stop_at(city: &str, arrival: u32, departure: u32) -> NewStop {
        NewStop {
            city_id: city.into(),
            city_name: None,
            arrival_date: date(arrival),
            departure_date: date(departure),
            notes: None,
            position: None,
        }
    }

    fn assign(activity_id: &str) -> AssignActivity {
        AssignActivity {
            activity_id: activity_id.into(),
            position: None,
            start_time: None,
            end_time: None,
        }
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let store = TripStore::new(db.pool.clone());
        let user = store
            .create_user(NewUser {
                display_name: "Ada".into(),
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        let trip = store
            .create_trip(
                &user.id,
                NewTrip {
                    title: "Rail tour".into(),
                    description: None,
                    start_date: date(1),
                    end_date: date(10),
                    budget: Decimal::from(1000),
                },
            )
            .await
            .unwrap();
        Fixture {
            tree: ItineraryTree::new(db.pool.clone()),
            store,
            owner_id: user.id,
            trip_id: trip.id,
            db,
        }
    }

    async fn pool_activity(fx: &Fixture, name: &str, cost: i64) -> Activity {
        fx.store
            .create_activity(
                &fx.owner_id,
                NewActivity {
                    name: name.into(),
                    description: None,
                    city_id: None,
                    cost: Decimal::from(cost),
                    duration_minutes: 60,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn appended_stops_never_share_a_position() {
        let fx = fixture().await;
        for day in 1..=5 {
            fx.tree
                .add_stop(&fx.trip_id, stop_at("city", day, day + 1))
                .await
                .unwrap();
        }
        let tree = fx.tree.load_tree(&fx.trip_id).await.unwrap();
        let positions: Vec<i64> = tree.stops.iter().map(|node| node.stop.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn concurrent_appends_stay_unique() {
        let fx = fixture().await;
        let mut handles = Vec::new();
        for day in 1..=8 {
            let tree = fx.tree.clone();
            let trip_id = fx.trip_id.clone();
            handles.push(tokio::spawn(async move {
                tree.add_stop(&trip_id, stop_at("city", 1, day)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let mut conn = fx.db.pool.acquire().await.unwrap();
        let positions: Vec<i64> = OrderedCollection::stops_of(&fx.trip_id)
            .positions(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, position)| position)
            .collect();
        assert_eq!(positions, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn inverted_stop_dates_create_nothing() {
        let fx = fixture().await;
        let result = fx.tree.add_stop(&fx.trip_id, stop_at("rome", 5, 3)).await;
        assert!(matches!(result, Err(AppError::InvalidRange)));
        assert!(fx.tree.load_tree(&fx.trip_id).await.unwrap().stops.is_empty());
    }

    #[tokio::test]
    async fn removing_a_stop_removes_its_activities() {
        let fx = fixture().await;
        let stop = fx.tree.add_stop(&fx.trip_id, stop_at("paris", 1, 3)).await.unwrap();
        let keep = fx.tree.add_stop(&fx.trip_id, stop_at("lyon", 3, 4)).await.unwrap();
        let louvre = pool_activity(&fx, "Louvre", 17).await;
        let market = pool_activity(&fx, "Market", 0).await;
        fx.tree.assign_activity(&fx.trip_id, &stop.id, assign(&louvre.id)).await.unwrap();
        fx.tree.assign_activity(&fx.trip_id, &keep.id, assign(&market.id)).await.unwrap();

        fx.tree.remove_stop(&fx.trip_id, &stop.id).await.unwrap();

        assert!(matches!(
            fx.store.get_activity(&louvre.id, Some(&fx.owner_id)).await,
            Err(AppError::NotFound)
        ));
        let tree = fx.tree.load_tree(&fx.trip_id).await.unwrap();
        assert_eq!(tree.stops.len(), 1);
        assert_eq!(tree.stops[0].activities[0].id, market.id);
        assert_eq!(tree.stops[0].stop.position, 1);
    }

    #[tokio::test]
    async fn removing_a_foreign_stop_is_not_found() {
        let fx = fixture().await;
        let result = fx.tree.remove_stop(&fx.trip_id, "missing").await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn unassign_then_assign_restores_a_unique_slot() {
        let fx = fixture().await;
        let stop = fx.tree.add_stop(&fx.trip_id, stop_at("paris", 1, 3)).await.unwrap();
        let mut ids = Vec::new();
        for name in ["Louvre", "Orsay", "Eiffel"] {
            let activity = pool_activity(&fx, name, 10).await;
            fx.tree
                .assign_activity(&fx.trip_id, &stop.id, assign(&activity.id))
                .await
                .unwrap();
            ids.push(activity.id);
        }

        let start = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
        let pooled = fx.tree.unassign_activity(&fx.trip_id, &ids[0]).await.unwrap();
        assert_eq!(pooled.stop_id, None);
        assert_eq!(pooled.position, 0);
        assert_eq!(pooled.start_time, None);

        let back = fx
            .tree
            .assign_activity(
                &fx.trip_id,
                &stop.id,
                AssignActivity {
                    start_time: Some(start),
                    ..assign(&ids[0])
                },
            )
            .await
            .unwrap();
        assert_eq!(back.stop_id.as_deref(), Some(stop.id.as_str()));
        assert_eq!(back.position, 3);
        assert_eq!(back.start_time, Some(start));

        let tree = fx.tree.load_tree(&fx.trip_id).await.unwrap();
        let positions: Vec<i64> = tree.stops[0].activities.iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unassigning_a_pool_activity_is_not_found() {
        let fx = fixture().await;
        let activity = pool_activity(&fx, "Louvre", 17).await;
        let result = fx.tree.unassign_activity(&fx.trip_id, &activity.id).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn stops_of_other_trips_are_rejected() {
        let fx = fixture().await;
        let other = fx
            .store
            .create_trip(
                &fx.owner_id,
                NewTrip {
                    title: "Other".into(),
                    description: None,
                    start_date: date(1),
                    end_date: date(2),
                    budget: Decimal::ZERO,
                },
            )
            .await
            .unwrap();
        let foreign_stop = fx.tree.add_stop(&other.id, stop_at("oslo", 1, 2)).await.unwrap();
        let activity = pool_activity(&fx, "Fjord", 100).await;

        let result = fx
            .tree
            .assign_activity(&fx.trip_id, &foreign_stop.id, assign(&activity.id))
            .await;
        assert!(matches!(result, Err(AppError::ScopeMismatch)));

        fx.tree
            .assign_activity(&other.id, &foreign_stop.id, assign(&activity.id))
            .await
            .unwrap();
        let own_stop = fx.tree.add_stop(&fx.trip_id, stop_at("paris", 1, 2)).await.unwrap();
        let stolen = fx
            .tree
            .assign_activity(&fx.trip_id, &own_stop.id, assign(&activity.id))
            .await;
        assert!(matches!(stolen, Err(AppError::ScopeMismatch)));
    }

    #[tokio::test]
    async fn moving_between_stops_of_one_trip_keeps_one_copy() {
        let fx = fixture().await;
        let paris = fx.tree.add_stop(&fx.trip_id, stop_at("paris", 1, 3)).await.unwrap();
        let lyon = fx.tree.add_stop(&fx.trip_id, stop_at("lyon", 3, 5)).await.unwrap();
        let activity = pool_activity(&fx, "Walk", 0).await;
        fx.tree.assign_activity(&fx.trip_id, &paris.id, assign(&activity.id)).await.unwrap();
        let moved = fx
            .tree
            .assign_activity(&fx.trip_id, &lyon.id, assign(&activity.id))
            .await
            .unwrap();
        assert_eq!(moved.stop_id.as_deref(), Some(lyon.id.as_str()));
        let tree = fx.tree.load_tree(&fx.trip_id).await.unwrap();
        assert!(tree.stops[0].activities.is_empty());
        assert_eq!(tree.stops[1].activities.len(), 1);
    }

    #[tokio::test]
    async fn reorder_stop_moves_to_exact_slot() {
        let fx = fixture().await;
        let a = fx.tree.add_stop(&fx.trip_id, stop_at("a", 1, 2)).await.unwrap();
        let b = fx.tree.add_stop(&fx.trip_id, stop_at("b", 2, 3)).await.unwrap();
        let moved = fx.tree.reorder_stop(&fx.trip_id, &b.id, 0).await.unwrap();
        assert_eq!(moved.position, 0);
        let tree = fx.tree.load_tree(&fx.trip_id).await.unwrap();
        let order: Vec<&str> = tree.stops.iter().map(|n| n.stop.id.as_str()).collect();
        assert_eq!(order, vec![b.id.as_str(), a.id.as_str()]);
    }

    #[tokio::test]
    async fn inverted_schedule_is_rejected() {
        let fx = fixture().await;
        let stop = fx.tree.add_stop(&fx.trip_id, stop_at("paris", 1, 3)).await.unwrap();
        let activity = pool_activity(&fx, "Louvre", 17).await;
        let start = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
        let result = fx
            .tree
            .assign_activity(
                &fx.trip_id,
                &stop.id,
                AssignActivity {
                    start_time: Some(start),
                    end_time: Some(end),
                    ..assign(&activity.id)
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidRange)));
    }

    #[tokio::test]
    async fn another_users_pool_activity_cannot_be_scheduled() {
        let fx = fixture().await;
        let eve = fx
            .store
            .create_user(NewUser {
                display_name: "Eve".into(),
                email: "eve@example.com".into(),
            })
            .await
            .unwrap();
        let eve_trip = fx
            .store
            .create_trip(
                &eve.id,
                NewTrip {
                    title: "Eve's trip".into(),
                    description: None,
                    start_date: date(1),
                    end_date: date(3),
                    budget: Decimal::ZERO,
                },
            )
            .await
            .unwrap();
        let eve_stop = fx.tree.add_stop(&eve_trip.id, stop_at("rome", 1, 2)).await.unwrap();
        let catalog_item = pool_activity(&fx, "Ada's walking tour", 25).await;

        let taken = fx
            .tree
            .assign_activity(&eve_trip.id, &eve_stop.id, assign(&catalog_item.id))
            .await;
        assert!(matches!(taken, Err(AppError::ScopeMismatch)));

        fx.tree.remove_stop(&eve_trip.id, &eve_stop.id).await.unwrap();
        let survivor = fx
            .store
            .get_activity(&catalog_item.id, Some(&fx.owner_id))
            .await
            .unwrap();
        assert_eq!(survivor.stop_id, None);
    }
}
