use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, patch, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        activity::{Activity, AssignActivity},
        stop::{NewStop, Stop, StopPatch},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:trip_id/stops", post(add_stop))
        .route(
            "/:trip_id/stops/:stop_id",
            patch(update_stop).delete(remove_stop),
        )
        .route("/:trip_id/stops/:stop_id/position", put(reorder_stop))
        .route("/:trip_id/stops/:stop_id/activities", post(assign_activity))
        .route(
            "/:trip_id/activities/:activity_id/assignment",
            delete(unassign_activity),
        )
        .route(
            "/:trip_id/activities/:activity_id/position",
            put(reorder_activity),
        )
}

#[derive(Deserialize)]
struct PositionForm {
    position: i64,
}

async fn add_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(form): Json<NewStop>,
) -> Result<(StatusCode, Json<Stop>), AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let stop = state.itinerary.add_stop(&trip_id, form).await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

async fn update_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
    Json(form): Json<StopPatch>,
) -> Result<Json<Stop>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let stop = state.itinerary.update_stop(&trip_id, &stop_id, form).await?;
    Ok(Json(stop))
}

async fn remove_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    state.itinerary.remove_stop(&trip_id, &stop_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
    Json(form): Json<PositionForm>,
) -> Result<Json<Stop>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let stop = state
        .itinerary
        .reorder_stop(&trip_id, &stop_id, form.position)
        .await?;
    Ok(Json(stop))
}

async fn assign_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
    Json(form): Json<AssignActivity>,
) -> Result<Json<Activity>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let activity = state
        .itinerary
        .assign_activity(&trip_id, &stop_id, form)
        .await?;
    Ok(Json(activity))
}

async fn unassign_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, activity_id)): Path<(String, String)>,
) -> Result<Json<Activity>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let activity = state
        .itinerary
        .unassign_activity(&trip_id, &activity_id)
        .await?;
    Ok(Json(activity))
}

async fn reorder_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, activity_id)): Path<(String, String)>,
    Json(form): Json<PositionForm>,
) -> Result<Json<Activity>, AppError> {
    current.require_owner(&state.store, &trip_id).await?;
    let activity = state
        .itinerary
        .reorder_activity(&trip_id, &activity_id, form.position)
        .await?;
    Ok(Json(activity))
}
