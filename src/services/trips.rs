use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        activity::{Activity, ActivityQuery, NewActivity, MAX_QUERY_LIMIT},
        expense::{Expense, ExpenseQuery, NewExpense},
        normalize_optional,
        trip::{NewTrip, Trip, TripPatch, TripQuery, Visibility},
        user::{NewUser, User},
    },
    services::visibility::can_read,
};

/// Plain persistence for the entities around the itinerary: users, trips, the
/// expense ledger and the pool activity catalog.
#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
}

impl TripStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let display_name = new.display_name.trim().to_string();
        let email = new.email.trim().to_lowercase();
        if display_name.is_empty() {
            return Err(AppError::BadRequest("display name is required".into()));
        }
        if !email.contains('@') {
            return Err(AppError::BadRequest("email address looks invalid".into()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            display_name,
            email,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO users (id, display_name, email, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&user.id)
            .bind(&user.display_name)
            .bind(&user.email)
            .bind(user.created_at)
            .execute(&self.db)
            .await
            .map_err(AppError::from_unique_violation)?;
        Ok(user)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, display_name, email, created_at FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn is_owner(&self, trip_id: &str, user_id: &str) -> Result<bool, AppError> {
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM trips WHERE id = ?1 AND owner_id = ?2")
                .bind(trip_id)
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(owned.is_some())
    }

    pub async fn create_trip(&self, owner_id: &str, new: NewTrip) -> Result<Trip, AppError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("trip title is required".into()));
        }
        validate_trip_fields(&new.start_date, &new.end_date, new.budget)?;

        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title,
            description: normalize_optional(new.description),
            start_date: new.start_date,
            end_date: new.end_date,
            budget: new.budget,
            visibility: Default::default(),
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"INSERT INTO trips (id, owner_id, title, description, start_date, end_date, budget, visibility, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
        )
        .bind(&trip.id)
        .bind(&trip.owner_id)
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.budget.to_string())
        .bind(trip.visibility.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.db)
        .await?;
        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?1")
            .bind(trip_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_trips(&self, owner_id: &str, query: &TripQuery) -> Result<Vec<Trip>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM trips WHERE owner_id = ");
        builder.push_bind(owner_id);
        if let Some(visibility) = query.visibility {
            builder.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        builder.push(" ORDER BY start_date, created_at");
        let trips = builder.build_query_as::<Trip>().fetch_all(&self.db).await?;
        Ok(trips)
    }

    pub async fn update_trip(&self, trip_id: &str, patch: TripPatch) -> Result<Trip, AppError> {
        let mut trip = self.get_trip(trip_id).await?;
        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::BadRequest("trip title is required".into()));
            }
            trip.title = title;
        }
        if patch.description.is_some() {
            trip.description = normalize_optional(patch.description);
        }
        trip.start_date = patch.start_date.unwrap_or(trip.start_date);
        trip.end_date = patch.end_date.unwrap_or(trip.end_date);
        trip.budget = patch.budget.unwrap_or(trip.budget);
        validate_trip_fields(&trip.start_date, &trip.end_date, trip.budget)?;
        trip.updated_at = Utc::now();

        sqlx::query(
            r#"UPDATE trips SET title = ?1, description = ?2, start_date = ?3, end_date = ?4, budget = ?5, updated_at = ?6
               WHERE id = ?7"#,
        )
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.budget.to_string())
        .bind(trip.updated_at)
        .bind(&trip.id)
        .execute(&self.db)
        .await?;
        Ok(trip)
    }

    /// Deletes the trip with its stops, their activities, expenses and share
    /// history as one unit. Foreign keys have no cascade, so the order matters.
    pub async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "DELETE FROM activities WHERE stop_id IN (SELECT id FROM stops WHERE trip_id = ?1)",
        )
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;
        for sql in [
            "DELETE FROM stops WHERE trip_id = ?1",
            "DELETE FROM expenses WHERE trip_id = ?1",
            "DELETE FROM share_records WHERE trip_id = ?1",
        ] {
            sqlx::query(sql).bind(trip_id).execute(&mut *tx).await?;
        }
        let deleted = sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn add_expense(&self, trip_id: &str, new: NewExpense) -> Result<Expense, AppError> {
        new.validate()?;
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            category: new.category,
            amount: new.amount,
            spent_on: new.spent_on,
            note: normalize_optional(new.note),
            created_at: Utc::now(),
        };
        let inserted = sqlx::query(
            r#"INSERT INTO expenses (id, trip_id, category, amount, spent_on, note, created_at)
               SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7 WHERE EXISTS (SELECT 1 FROM trips WHERE id = ?2)"#,
        )
        .bind(&expense.id)
        .bind(&expense.trip_id)
        .bind(expense.category.as_str())
        .bind(expense.amount.to_string())
        .bind(expense.spent_on)
        .bind(&expense.note)
        .bind(expense.created_at)
        .execute(&self.db)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(expense)
    }

    pub async fn list_expenses(
        &self,
        trip_id: &str,
        query: &ExpenseQuery,
    ) -> Result<Vec<Expense>, AppError> {
        query.validate()?;
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM expenses WHERE trip_id = ");
        builder.push_bind(trip_id);
        if let Some(category) = query.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(from) = query.from {
            builder.push(" AND spent_on >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND spent_on <= ").push_bind(to);
        }
        builder.push(" ORDER BY spent_on, created_at");
        let expenses = builder.build_query_as::<Expense>().fetch_all(&self.db).await?;
        Ok(expenses)
    }

    pub async fn delete_expense(&self, trip_id: &str, expense_id: &str) -> Result<(), AppError> {
        let deleted = sqlx::query("DELETE FROM expenses WHERE id = ?1 AND trip_id = ?2")
            .bind(expense_id)
            .bind(trip_id)
            .execute(&self.db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Adds an unscheduled activity to `owner_id`'s pool.
    pub async fn create_activity(
        &self,
        owner_id: &str,
        new: NewActivity,
    ) -> Result<Activity, AppError> {
        new.validate()?;
        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            description: normalize_optional(new.description),
            city_id: normalize_optional(new.city_id),
            cost: new.cost,
            duration_minutes: new.duration_minutes,
            stop_id: None,
            position: 0,
            start_time: None,
            end_time: None,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"INSERT INTO activities (id, owner_id, name, description, city_id, cost, duration_minutes, position, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)"#,
        )
        .bind(&activity.id)
        .bind(&activity.owner_id)
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(&activity.city_id)
        .bind(activity.cost.to_string())
        .bind(activity.duration_minutes)
        .bind(activity.created_at)
        .execute(&self.db)
        .await?;
        Ok(activity)
    }

    /// A scheduled activity is visible only to callers who may read its trip; pool
    /// items are visible to everyone.
    pub async fn get_activity(
        &self,
        activity_id: &str,
        caller_id: Option<&str>,
    ) -> Result<Activity, AppError> {
        let activity = sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = ?1")
            .bind(activity_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        if let Some(stop_id) = activity.stop_id.as_deref() {
            self.readable_trip_of_stop(stop_id, caller_id).await?;
        }
        Ok(activity)
    }

    /// Pool items plus the scheduled activities of trips the caller may read.
    pub async fn list_activities(
        &self,
        query: &ActivityQuery,
        caller_id: Option<&str>,
    ) -> Result<Vec<Activity>, AppError> {
        query.validate()?;
        if let Some(stop_id) = query.stop_id.as_deref() {
            self.readable_trip_of_stop(stop_id, caller_id).await?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT a.* FROM activities a
               LEFT JOIN stops s ON s.id = a.stop_id
               LEFT JOIN trips t ON t.id = s.trip_id
               WHERE (a.stop_id IS NULL OR t.visibility != "#,
        );
        builder
            .push_bind(Visibility::Private.as_str())
            .push(" OR t.owner_id = ")
            .push_bind(caller_id)
            .push(")");
        if let Some(city_id) = &query.city_id {
            builder.push(" AND a.city_id = ").push_bind(city_id);
        }
        if let Some(stop_id) = &query.stop_id {
            builder.push(" AND a.stop_id = ").push_bind(stop_id);
        }
        if query.unassigned_only {
            builder.push(" AND a.stop_id IS NULL");
        }
        if let Some(max_cost) = query.max_cost {
            builder
                .push(" AND CAST(a.cost AS REAL) <= CAST(")
                .push_bind(max_cost.to_string())
                .push(" AS REAL)");
        }
        builder
            .push(" ORDER BY a.name, a.id LIMIT ")
            .push_bind(query.limit.unwrap_or(MAX_QUERY_LIMIT));

        let mut activities = builder
            .build_query_as::<Activity>()
            .fetch_all(&self.db)
            .await?;
        // REAL can tie values that differ past double precision.
        if let Some(max_cost) = query.max_cost {
            activities.retain(|activity| activity.cost <= max_cost);
        }
        Ok(activities)
    }

    /// The trip a stop belongs to, or `NotFound` when the stop is missing or the
    /// caller may not read that trip.
    async fn readable_trip_of_stop(
        &self,
        stop_id: &str,
        caller_id: Option<&str>,
    ) -> Result<Trip, AppError> {
        let trip = sqlx::query_as::<_, Trip>(
            "SELECT t.* FROM trips t JOIN stops s ON s.trip_id = t.id WHERE s.id = ?1",
        )
        .bind(stop_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;
        if !can_read(&trip, caller_id) {
            return Err(AppError::NotFound);
        }
        Ok(trip)
    }
}

fn validate_trip_fields(start: &NaiveDate, end: &NaiveDate, budget: Decimal) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::InvalidRange);
    }
    if budget < Decimal::ZERO {
        return Err(AppError::BadRequest("budget must not be negative".into()));
    }
    Ok(())
}
