//! Routes for delivering world events to the trigger pipeline.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use delve_core::actor::Actor;
use delve_core::error::DomainError;
use delve_core::execution::TriggerResult;
use delve_core::ids::{InstanceId, TriggerId};
use delve_instances::domain::instance::DungeonInstance;
use delve_triggers::domain::event::WorldEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST / and POST /preview.
#[derive(Debug, Deserialize)]
pub struct WorldEventRequest {
    /// What happened.
    pub event: WorldEvent,
    /// Who caused it, if anyone.
    #[serde(default)]
    pub actor: Option<Actor>,
    /// Instance to dispatch in. Resolved from the actor's binding when absent.
    #[serde(default)]
    pub instance_id: Option<InstanceId>,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
pub struct WorldEventResponse {
    /// Instance the event was dispatched in; `None` for global dispatch.
    pub instance_id: Option<InstanceId>,
    /// One entry per trigger that fired, in registration order.
    pub results: Vec<TriggerResult>,
}

/// Response body for POST /preview.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub instance_id: Option<InstanceId>,
    /// Triggers that would fire right now.
    pub trigger_ids: Vec<TriggerId>,
}

fn resolve_instance(
    state: &AppState,
    request: &WorldEventRequest,
) -> Result<Option<DungeonInstance>, ApiError> {
    if let Some(id) = &request.instance_id {
        return state
            .registry
            .get_instance(id)
            .map(Some)
            .ok_or_else(|| DomainError::NotFound(format!("instance {id}")).into());
    }
    Ok(request
        .actor
        .as_ref()
        .and_then(|actor| state.registry.get_instance_for_actor(&actor.id)))
}

/// POST /
#[instrument(skip(state, request), fields(event = %request.event.kind()))]
async fn dispatch_event(
    State(state): State<AppState>,
    Json(request): Json<WorldEventRequest>,
) -> Result<Json<WorldEventResponse>, ApiError> {
    let instance = resolve_instance(&state, &request)?;
    debug!(instance_id = ?instance.as_ref().map(DungeonInstance::id), "event resolved");

    let results = state
        .triggers
        .handle_event(&request.event, request.actor.as_ref(), instance.as_ref());

    Ok(Json(WorldEventResponse {
        instance_id: instance.map(|i| i.id().clone()),
        results,
    }))
}

/// POST /preview
async fn preview_event(
    State(state): State<AppState>,
    Json(request): Json<WorldEventRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let instance = resolve_instance(&state, &request)?;
    let trigger_ids = state
        .triggers
        .would_fire(&request.event, request.actor.as_ref(), instance.as_ref());

    Ok(Json(PreviewResponse {
        instance_id: instance.map(|i| i.id().clone()),
        trigger_ids,
    }))
}

/// Returns the router for world events.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(dispatch_event))
        .route("/preview", post(preview_event))
}
