//! Routes for registering and operating triggers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use delve_core::error::DomainError;
use delve_core::ids::TriggerId;
use delve_triggers::application::query_handlers::{self, TriggerView};
use delve_triggers::domain::definition::TriggerDefinition;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /
#[instrument(skip(state, definition), fields(trigger_id = %definition.id))]
async fn register_trigger(
    State(state): State<AppState>,
    Json(definition): Json<TriggerDefinition>,
) -> Result<(StatusCode, Json<TriggerView>), ApiError> {
    let trigger = definition.into_trigger()?;
    let id = trigger.id().clone();
    if !state.triggers.register_trigger(trigger) {
        return Err(DomainError::AlreadyExists(format!("trigger {id}")).into());
    }

    info!(trigger_id = %id, "trigger registered over http");

    let view = query_handlers::get_trigger_by_id(&id, &state.triggers)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /
async fn list_triggers(State(state): State<AppState>) -> Json<Vec<TriggerView>> {
    Json(state.triggers.list_triggers())
}

/// GET /{id}
async fn get_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriggerView>, ApiError> {
    let view = query_handlers::get_trigger_by_id(&TriggerId::new(id), &state.triggers)?;
    Ok(Json(view))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn unregister_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TriggerId::new(id);
    if state.triggers.unregister_trigger(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DomainError::NotFound(format!("trigger {id}")).into())
    }
}

fn switch(state: &AppState, id: &str, enabled: bool) -> Result<Json<TriggerView>, ApiError> {
    let id = TriggerId::new(id);
    if !state.triggers.set_enabled(&id, enabled) {
        return Err(DomainError::NotFound(format!("trigger {id}")).into());
    }
    Ok(Json(query_handlers::get_trigger_by_id(&id, &state.triggers)?))
}

/// POST /{id}/enable
#[instrument(skip(state))]
async fn enable_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriggerView>, ApiError> {
    switch(&state, &id, true)
}

/// POST /{id}/disable
#[instrument(skip(state))]
async fn disable_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriggerView>, ApiError> {
    switch(&state, &id, false)
}

/// POST /{id}/reset-cooldown
#[instrument(skip(state))]
async fn reset_cooldown(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriggerView>, ApiError> {
    let id = TriggerId::new(id);
    if !state.triggers.reset_cooldown(&id) {
        return Err(DomainError::NotFound(format!("trigger {id}")).into());
    }
    Ok(Json(query_handlers::get_trigger_by_id(&id, &state.triggers)?))
}

/// Returns the router for triggers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_trigger).get(list_triggers))
        .route("/{id}", get(get_trigger).delete(unregister_trigger))
        .route("/{id}/enable", post(enable_trigger))
        .route("/{id}/disable", post(disable_trigger))
        .route("/{id}/reset-cooldown", post(reset_cooldown))
}
