use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        expense::{Expense, ExpenseQuery, NewExpense},
        share::{IssuedShare, ShareHistoryEntry, SharedTrip},
        trip::{NewTrip, Trip, TripPatch, TripQuery, Visibility},
    },
    services::{budget::BudgetSnapshot, visibility::can_read},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trips).post(create_trip))
        .route(
            "/:trip_id",
            get(trip_detail).patch(update_trip).delete(delete_trip),
        )
        .route("/:trip_id/visibility", put(set_visibility))
        .route("/:trip_id/share", post(issue_share))
        .route("/:trip_id/shares", get(share_history))
        .route("/:trip_id/budget", get(budget))
        .route("/:trip_id/expenses", get(list_expenses).post(add_expense))
        .route("/:trip_id/expenses/:expense_id", delete(delete_expense))
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TripQuery>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let user = current.require_user()?;
    let trips = state.store.list_trips(&user.id, &query).await?;
    Ok(Json(trips))
}

async fn create_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let user = current.require_user()?;
    let trip = state.store.create_trip(&user.id, form).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// Owners get the full tree; anyone else allowed to read gets the public view.
async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Response, AppError> {
    let trip = readable_trip(&state, &current, &trip_id).await?;
    let tree = state.itinerary.load_tree(&trip_id).await?;
    if current.id().is_some_and(|id| trip.is_owned_by(id)) {
        return Ok(Json(tree).into_response());
    }
    let owner = state
        .store
        .find_user(&trip.owner_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(SharedTrip::from_tree(tree, owner.display_name)).into_response())
}

async fn update_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(patch): Json<TripPatch>,
) -> Result<Json<Trip>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let trip = state.store.update_trip(&trip_id, patch).await?;
    Ok(Json(trip))
}

async fn delete_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = current.require_owner(&state.store, &trip_id).await?;
    state.store.delete_trip(&trip_id).await?;
    info!(trip_id = %trip_id, user_id = %user.id, "trip deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct VisibilityForm {
    visibility: Visibility,
}

async fn set_visibility(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(form): Json<VisibilityForm>,
) -> Result<Json<Trip>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let trip = state
        .visibility
        .set_visibility(&trip_id, form.visibility)
        .await?;
    Ok(Json(trip))
}

async fn issue_share(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<(StatusCode, Json<IssuedShare>), AppError> {
    let user = current.require_owner(&state.store, &trip_id).await?;
    let issued = match state.visibility.issue_share(&trip_id, &user.id).await {
        Err(AppError::Conflict) => {
            warn!(trip_id = %trip_id, "share token collided, retrying once");
            state.visibility.issue_share(&trip_id, &user.id).await?
        }
        other => other?,
    };
    info!(trip_id = %trip_id, "share link issued");
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn share_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<ShareHistoryEntry>>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let history = state.visibility.share_history(&trip_id).await?;
    Ok(Json(history))
}

async fn budget(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<BudgetSnapshot>, AppError> {
    readable_trip(&state, &current, &trip_id).await?;
    let snapshot = state.budget.snapshot(&trip_id).await?;
    Ok(Json(snapshot))
}

async fn list_expenses(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    readable_trip(&state, &current, &trip_id).await?;
    let expenses = state.store.list_expenses(&trip_id, &query).await?;
    Ok(Json(expenses))
}

async fn add_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(form): Json<NewExpense>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let expense = state.store.add_expense(&trip_id, form).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn delete_expense(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, expense_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    state.store.delete_expense(&trip_id, &expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Private trips are indistinguishable from missing ones for non-owners.
async fn readable_trip(
    state: &AppState,
    current: &CurrentUser,
    trip_id: &str,
) -> Result<Trip, AppError> {
    let trip = state.store.get_trip(trip_id).await?;
    if !can_read(&trip, current.id()) {
        return Err(AppError::NotFound);
    }
    Ok(trip)
}
