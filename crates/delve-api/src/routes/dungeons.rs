//! Routes for dungeon instances and their players.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use delve_core::error::DomainError;
use delve_core::geometry::Location;
use delve_core::ids::{ActorId, InstanceId};
use delve_instances::application::{command_handlers, generation, query_handlers};
use delve_instances::domain::commands;
use delve_instances::domain::registry::RegistryStats;
use delve_triggers::application::query_handlers::TriggerView;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

fn default_theme() -> String {
    "default".to_owned()
}

fn default_created_by() -> String {
    "system".to_owned()
}

fn default_true() -> bool {
    true
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateDungeonRequest {
    /// Template to instantiate.
    pub template_id: String,
    /// Theme applied to the template.
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Anchor point of the new instance.
    pub location: Option<Location>,
    /// Who is asking.
    #[serde(default = "default_created_by")]
    pub created_by: String,
    /// Why the instance is being created.
    #[serde(default)]
    pub reason: String,
    /// Run the layout generator. When false the instance gets the
    /// configured default boundary straight away.
    #[serde(default = "default_true")]
    pub generate: bool,
}

/// Request body for POST /{id}/players.
#[derive(Debug, Deserialize)]
pub struct BindPlayerRequest {
    /// The actor entering the instance.
    pub actor_id: Uuid,
}

/// Response body for DELETE /{id}.
#[derive(Debug, Serialize)]
pub struct DestroyDungeonResponse {
    /// The destroyed instance.
    pub instance_id: InstanceId,
    /// How many instance-scoped triggers were unregistered with it.
    pub triggers_removed: usize,
}

/// POST /
#[instrument(skip(state, request), fields(template_id = %request.template_id))]
async fn create_dungeon(
    State(state): State<AppState>,
    Json(request): Json<CreateDungeonRequest>,
) -> Result<(StatusCode, Json<query_handlers::InstanceView>), ApiError> {
    let command = commands::CreateDungeon {
        correlation_id: Uuid::new_v4(),
        template_id: request.template_id,
        theme: request.theme,
        location: request.location,
        created_by: request.created_by,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling create_dungeon command");

    let instance = if request.generate {
        generation::handle_generate_dungeon(&command, &state.registry, state.generator.as_ref())
            .await?
    } else {
        command_handlers::handle_create_dungeon(&command, &state.registry)?
    };

    Ok((
        StatusCode::CREATED,
        Json(query_handlers::InstanceView::from(&instance)),
    ))
}

/// GET /
async fn list_dungeons(State(state): State<AppState>) -> Json<Vec<query_handlers::InstanceView>> {
    Json(query_handlers::list_instances(&state.registry))
}

/// GET /stats
async fn dungeon_stats(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(query_handlers::get_registry_stats(&state.registry))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_dungeon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<query_handlers::InstanceView>, ApiError> {
    let view = query_handlers::get_instance_by_id(&InstanceId::new(id), &state.registry)?;
    Ok(Json(view))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn destroy_dungeon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DestroyDungeonResponse>, ApiError> {
    let command = commands::DestroyDungeon {
        correlation_id: Uuid::new_v4(),
        instance_id: InstanceId::new(id),
    };

    info!(correlation_id = %command.correlation_id, "handling destroy_dungeon command");

    command_handlers::handle_destroy_dungeon(&command, &state.registry)?;
    let triggers_removed = state
        .triggers
        .unregister_dungeon_triggers(&command.instance_id);

    Ok(Json(DestroyDungeonResponse {
        instance_id: command.instance_id,
        triggers_removed,
    }))
}

/// GET /{id}/triggers
async fn dungeon_triggers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<TriggerView>> {
    Json(state.triggers.get_dungeon_triggers(&InstanceId::new(id)))
}

/// Response body for POST /{id}/triggers/suspend and /resume.
#[derive(Debug, Serialize)]
pub struct InstanceTriggersResponse {
    /// The instance whose triggers were switched.
    pub instance_id: InstanceId,
    /// Whether the triggers are now eligible to fire.
    pub active: bool,
    /// How many triggers changed.
    pub changed: usize,
}

fn switch_instance_triggers(
    state: &AppState,
    id: String,
    active: bool,
) -> Result<Json<InstanceTriggersResponse>, ApiError> {
    let instance_id = InstanceId::new(id);
    if state.registry.get_instance(&instance_id).is_none() {
        return Err(ApiError(DomainError::NotFound(format!("instance {instance_id}"))));
    }
    let changed = state.triggers.set_instance_active(&instance_id, active);
    info!(instance_id = %instance_id, active, changed, "instance triggers switched");
    Ok(Json(InstanceTriggersResponse {
        instance_id,
        active,
        changed,
    }))
}

/// POST /{id}/triggers/suspend
#[instrument(skip(state))]
async fn suspend_triggers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceTriggersResponse>, ApiError> {
    switch_instance_triggers(&state, id, false)
}

/// POST /{id}/triggers/resume
#[instrument(skip(state))]
async fn resume_triggers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceTriggersResponse>, ApiError> {
    switch_instance_triggers(&state, id, true)
}

/// POST /{id}/players
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn bind_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BindPlayerRequest>,
) -> Result<Json<query_handlers::InstanceView>, ApiError> {
    let command = commands::BindActor {
        correlation_id: Uuid::new_v4(),
        actor_id: ActorId(request.actor_id),
        instance_id: InstanceId::new(id),
    };

    info!(correlation_id = %command.correlation_id, "handling bind_actor command");

    let instance = command_handlers::handle_bind_actor(&command, &state.registry)?;
    Ok(Json(query_handlers::InstanceView::from(&instance)))
}

/// DELETE /{id}/players/{actor_id}
#[instrument(skip(state))]
async fn unbind_player(
    State(state): State<AppState>,
    Path((id, actor_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let command = commands::UnbindActor {
        correlation_id: Uuid::new_v4(),
        actor_id: ActorId(actor_id),
        instance_id: InstanceId::new(id),
    };

    info!(correlation_id = %command.correlation_id, "handling unbind_actor command");

    command_handlers::handle_unbind_actor(&command, &state.registry)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for dungeon instances.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_dungeon).get(list_dungeons))
        .route("/stats", get(dungeon_stats))
        .route("/{id}", get(get_dungeon).delete(destroy_dungeon))
        .route("/{id}/triggers", get(dungeon_triggers))
        .route("/{id}/triggers/suspend", post(suspend_triggers))
        .route("/{id}/triggers/resume", post(resume_triggers))
        .route("/{id}/players", post(bind_player))
        .route("/{id}/players/{actor_id}", delete(unbind_player))
}
