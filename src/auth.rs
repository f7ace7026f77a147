use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::trips::TripStore, state::AppState};

/// Header carrying the caller's user id. Authentication proper happens upstream.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        Ok(Self(None))
    }
}

impl CurrentUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.id.as_str())
    }

    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    /// Write authority over a trip. A trip that does not exist is `NotFound`, one
    /// owned by somebody else is `Forbidden`.
    pub async fn require_owner(
        &self,
        store: &TripStore,
        trip_id: &str,
    ) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_user()?;
        if store.is_owner(trip_id, &user.id).await? {
            return Ok(user);
        }
        store.get_trip(trip_id).await?;
        Err(AppError::Forbidden)
    }
}

/// Resolves the caller named in [`USER_HEADER`] and stores it in the request
/// extensions. Requests without the header continue anonymously; an unknown id is
/// rejected.
pub async fn identify_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get(USER_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(|raw| raw.trim().to_string())
                .map_err(|_| AppError::Unauthorized)
        })
        .transpose()?;

    if let Some(user_id) = user_id {
        let user = state
            .store
            .find_user(&user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        request.extensions_mut().insert(AuthenticatedUser {
            id: user.id,
            display_name: user.display_name,
        });
    }

    Ok(next.run(request).await)
}
