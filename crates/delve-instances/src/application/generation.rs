//! Asynchronous dungeon creation.
//!
//! The instance is registered in `Creating` before generation starts, so its
//! footprint is claimed and visible. If it is destroyed while the generator
//! runs, the late completion is rejected and the instance stays gone.

use delve_core::command::Command;
use delve_core::error::DomainError;
use delve_core::generation::GenerationService;
use tracing::{info, warn};

use crate::domain::commands::CreateDungeon;
use crate::domain::instance::DungeonInstance;
use crate::domain::registry::InstanceRegistry;

/// Handles the `CreateDungeon` command through a generation service:
/// begin, generate, then complete or abort.
///
/// # Errors
///
/// Returns the validation/capacity errors of
/// [`InstanceRegistry::begin_creation`], the generator's error (after the
/// instance has been aborted), or the completion error if the instance was
/// destroyed mid-generation.
pub async fn handle_generate_dungeon(
    command: &CreateDungeon,
    registry: &InstanceRegistry,
    generator: &dyn GenerationService,
) -> Result<DungeonInstance, DomainError> {
    let id = registry.begin_creation(
        &command.template_id,
        &command.theme,
        command.location.as_ref(),
        &command.created_by,
        &command.reason,
    )?;
    info!(
        instance_id = %id,
        correlation_id = %command.correlation_id(),
        "generating dungeon layout"
    );

    let origin = match registry.get_instance(&id) {
        Some(instance) => instance.origin().clone(),
        None => return Err(DomainError::NotFound(format!("instance {id}"))),
    };

    match generator.generate(&command.template_id, &origin).await {
        Ok(geometry) => registry.complete_creation(&id, geometry),
        Err(err) => {
            warn!(instance_id = %id, error = %err, "dungeon generation failed");
            registry.abort_creation(&id);
            Err(err)
        }
    }
}
