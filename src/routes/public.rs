use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use crate::{
    error::AppError,
    models::{share::SharedTrip, user::{NewUser, User}},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/shared/:token", get(shared_trip))
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.store.create_user(form).await?;
    debug!(user_id = %user.id, "registered user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn shared_trip(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SharedTrip>, AppError> {
    let shared = state.visibility.resolve_shared(&token).await?;
    Ok(Json(shared))
}
