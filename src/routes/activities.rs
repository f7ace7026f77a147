use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::activity::{Activity, ActivityQuery, NewActivity},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route("/:activity_id", get(activity_detail))
}

async fn list_activities(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let activities = state.store.list_activities(&query, current.id()).await?;
    Ok(Json(activities))
}

async fn create_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let user = current.require_user()?;
    let activity = state.store.create_activity(&user.id, form).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn activity_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<String>,
) -> Result<Json<Activity>, AppError> {
    let activity = state.store.get_activity(&activity_id, current.id()).await?;
    Ok(Json(activity))
}
