//! Routes for looking up and releasing actors' instance bindings.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use delve_core::error::DomainError;
use delve_core::ids::{ActorId, InstanceId};
use delve_instances::application::query_handlers::{self, InstanceView};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for DELETE /{actor_id}/dungeon.
#[derive(Debug, Serialize)]
pub struct ReleaseActorResponse {
    /// The instance the actor left.
    pub instance_id: InstanceId,
}

/// GET /{actor_id}/dungeon
async fn actor_dungeon(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Result<Json<InstanceView>, ApiError> {
    let view = query_handlers::get_instance_for_actor(&ActorId(actor_id), &state.registry)?;
    Ok(Json(view))
}

/// DELETE /{actor_id}/dungeon
///
/// Drops the actor's binding wherever it is, e.g. on disconnect.
#[instrument(skip(state))]
async fn release_actor(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Result<Json<ReleaseActorResponse>, ApiError> {
    let actor = ActorId(actor_id);
    let instance_id = state
        .registry
        .release_actor(actor)
        .ok_or_else(|| DomainError::NotFound(format!("binding for actor {actor}")))?;
    info!(%actor, instance_id = %instance_id, "actor released");
    Ok(Json(ReleaseActorResponse { instance_id }))
}

/// Returns the router for actor lookups.
pub fn router() -> Router<AppState> {
    Router::new().route("/{actor_id}/dungeon", get(actor_dungeon).delete(release_actor))
}
