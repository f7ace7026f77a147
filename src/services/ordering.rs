//! Sibling ordering shared by stops-within-a-trip and activities-within-a-stop.
//!
//! Every operation runs on a caller-supplied connection, normally a transaction that
//! already holds the write lock, so "current max + 1" cannot be observed twice.
//! Positions are never compacted: removal leaves gaps, and explicit placement shifts
//! the siblings at or after the target slot by one.

use sqlx::SqliteConnection;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingScope<'a> {
    TripStops(&'a str),
    StopActivities(&'a str),
}

impl<'a> SiblingScope<'a> {
    fn table(&self) -> &'static str {
        match self {
            SiblingScope::TripStops(_) => "stops",
            SiblingScope::StopActivities(_) => "activities",
        }
    }

    fn parent_column(&self) -> &'static str {
        match self {
            SiblingScope::TripStops(_) => "trip_id",
            SiblingScope::StopActivities(_) => "stop_id",
        }
    }

    pub fn parent_id(&self) -> &'a str {
        match self {
            SiblingScope::TripStops(id) | SiblingScope::StopActivities(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrderedCollection<'a> {
    scope: SiblingScope<'a>,
}

impl<'a> OrderedCollection<'a> {
    pub fn new(scope: SiblingScope<'a>) -> Self {
        Self { scope }
    }

    pub fn stops_of(trip_id: &'a str) -> Self {
        Self::new(SiblingScope::TripStops(trip_id))
    }

    pub fn activities_of(stop_id: &'a str) -> Self {
        Self::new(SiblingScope::StopActivities(stop_id))
    }

    pub fn scope(&self) -> SiblingScope<'a> {
        self.scope
    }

    /// `0` for an empty scope, otherwise one past the largest position.
    pub async fn next_position(&self, conn: &mut SqliteConnection) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM {} WHERE {} = ?1",
            self.scope.table(),
            self.scope.parent_column()
        );
        let next: i64 = sqlx::query_scalar(&sql)
            .bind(self.scope.parent_id())
            .fetch_one(conn)
            .await?;
        Ok(next)
    }

    pub async fn append(&self, conn: &mut SqliteConnection) -> Result<i64, AppError> {
        self.next_position(conn).await
    }

    /// Reserves a slot for a new sibling and returns its position. With no explicit
    /// position this is [`append`](Self::append).
    pub async fn insert_at(
        &self,
        conn: &mut SqliteConnection,
        position: Option<i64>,
    ) -> Result<i64, AppError> {
        match position {
            None => self.append(conn).await,
            Some(position) => {
                check_position(position)?;
                self.shift_from(conn, position, None).await?;
                Ok(position)
            }
        }
    }

    /// Moves an existing item (e.g. a pool activity) into this scope.
    pub async fn attach(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
        position: Option<i64>,
    ) -> Result<i64, AppError> {
        let position = self.insert_at(&mut *conn, position).await?;
        let sql = format!(
            "UPDATE {} SET {} = ?1, position = ?2 WHERE id = ?3",
            self.scope.table(),
            self.scope.parent_column()
        );
        let result = sqlx::query(&sql)
            .bind(self.scope.parent_id())
            .bind(position)
            .bind(item_id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(position)
    }

    /// Detaches an item. Stops cannot exist outside a trip and are deleted;
    /// activities fall back to the pool with their schedule cleared.
    pub async fn remove(&self, conn: &mut SqliteConnection, item_id: &str) -> Result<(), AppError> {
        self.ensure_member(&mut *conn, item_id).await?;
        let sql = match self.scope {
            SiblingScope::TripStops(_) => "DELETE FROM stops WHERE id = ?1",
            SiblingScope::StopActivities(_) => {
                "UPDATE activities SET stop_id = NULL, position = 0, start_time = NULL, end_time = NULL WHERE id = ?1"
            }
        };
        sqlx::query(sql).bind(item_id).execute(conn).await?;
        Ok(())
    }

    pub async fn reorder(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
        new_position: i64,
    ) -> Result<(), AppError> {
        check_position(new_position)?;
        self.ensure_member(&mut *conn, item_id).await?;
        self.shift_from(&mut *conn, new_position, Some(item_id)).await?;
        let sql = format!("UPDATE {} SET position = ?1 WHERE id = ?2", self.scope.table());
        sqlx::query(&sql)
            .bind(new_position)
            .bind(item_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// `NotFound` when the item does not exist, `ScopeMismatch` when it lives
    /// under another parent (or, for activities, in the pool).
    pub async fn ensure_member(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            self.scope.parent_column(),
            self.scope.table()
        );
        let parent: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(item_id)
            .fetch_optional(conn)
            .await?;
        match parent {
            None => Err(AppError::NotFound),
            Some(Some(parent)) if parent == self.scope.parent_id() => Ok(()),
            Some(_) => Err(AppError::ScopeMismatch),
        }
    }

    pub async fn positions(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<(String, i64)>, AppError> {
        let sql = format!(
            "SELECT id, position FROM {} WHERE {} = ?1 ORDER BY position, id",
            self.scope.table(),
            self.scope.parent_column()
        );
        let rows = sqlx::query_as(&sql)
            .bind(self.scope.parent_id())
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    async fn shift_from(
        &self,
        conn: &mut SqliteConnection,
        position: i64,
        except: Option<&str>,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET position = position + 1 WHERE {} = ?1 AND position >= ?2 AND id != ?3",
            self.scope.table(),
            self.scope.parent_column()
        );
        sqlx::query(&sql)
            .bind(self.scope.parent_id())
            .bind(position)
            .bind(except.unwrap_or(""))
            .execute(conn)
            .await?;
        Ok(())
    }
}

fn check_position(position: i64) -> Result<(), AppError> {
    if position < 0 {
        return Err(AppError::BadRequest("position must not be negative".into()));
    }
    Ok(())
}
