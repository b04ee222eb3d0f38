//! Delve API: HTTP surface over the instance registry and trigger manager.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod host;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router with every route mounted.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/dungeons", routes::dungeons::router())
        .nest("/api/v1/actors", routes::actors::router())
        .nest("/api/v1/triggers", routes::triggers::router())
        .nest("/api/v1/events", routes::events::router())
        .with_state(state)
}
