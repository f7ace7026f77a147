pub mod activities;
pub mod itinerary;
pub mod public;
pub mod trips;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{auth::identify_caller, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .nest("/trips", trips::router().merge(itinerary::router()))
        .nest("/activities", activities::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    identify_caller,
                )),
        )
        .with_state(state)
}
