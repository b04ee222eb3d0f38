//! Command handlers for the instance registry.
//!
//! These turn the registry's boolean outcomes into typed errors for callers
//! that need to tell "unknown" from "not allowed".

use delve_core::command::Command;
use delve_core::error::DomainError;
use tracing::debug;

use crate::domain::commands::{BindActor, CreateDungeon, DestroyDungeon, UnbindActor};
use crate::domain::instance::DungeonInstance;
use crate::domain::registry::InstanceRegistry;

/// Handles the `CreateDungeon` command with the registry's default boundary.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for blank inputs or a missing
/// location, `DomainError::CapacityExceeded` at the instance limit.
pub fn handle_create_dungeon(
    command: &CreateDungeon,
    registry: &InstanceRegistry,
) -> Result<DungeonInstance, DomainError> {
    debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id(),
        target = %command.target(),
        "handling command"
    );
    registry.create_dungeon_with_reason(
        &command.template_id,
        &command.theme,
        command.location.as_ref(),
        &command.created_by,
        &command.reason,
    )
}

/// Handles the `DestroyDungeon` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the instance does not exist.
pub fn handle_destroy_dungeon(
    command: &DestroyDungeon,
    registry: &InstanceRegistry,
) -> Result<(), DomainError> {
    debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id(),
        target = %command.target(),
        "handling command"
    );
    if registry.destroy_dungeon(&command.instance_id) {
        Ok(())
    } else {
        Err(DomainError::NotFound(format!(
            "instance {}",
            command.instance_id
        )))
    }
}

/// Handles the `BindActor` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the instance does not exist and
/// `DomainError::StateConflict` if it is not active.
pub fn handle_bind_actor(
    command: &BindActor,
    registry: &InstanceRegistry,
) -> Result<DungeonInstance, DomainError> {
    debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id(),
        target = %command.target(),
        "handling command"
    );
    if registry.bind_actor(command.actor_id, &command.instance_id) {
        return registry
            .get_instance(&command.instance_id)
            .ok_or_else(|| DomainError::NotFound(format!("instance {}", command.instance_id)));
    }
    match registry.get_instance(&command.instance_id) {
        None => Err(DomainError::NotFound(format!(
            "instance {}",
            command.instance_id
        ))),
        Some(instance) => Err(DomainError::StateConflict(format!(
            "instance {} is {:?}, not accepting players",
            instance.id(),
            instance.state()
        ))),
    }
}

/// Handles the `UnbindActor` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the actor is not bound to the given
/// instance.
pub fn handle_unbind_actor(
    command: &UnbindActor,
    registry: &InstanceRegistry,
) -> Result<(), DomainError> {
    debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id(),
        target = %command.target(),
        "handling command"
    );
    if registry.unbind_actor(command.actor_id, &command.instance_id) {
        Ok(())
    } else {
        Err(DomainError::NotFound(format!(
            "actor {} in instance {}",
            command.actor_id, command.instance_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use delve_core::geometry::{Location, WorldId};
    use delve_core::ids::{ActorId, InstanceId};
    use delve_test_support::{FixedClock, SequenceRng, fixed_now};
    use uuid::Uuid;

    use super::*;
    use crate::domain::registry::RegistryConfig;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(
            RegistryConfig::default(),
            Arc::new(FixedClock(fixed_now())),
            Box::new(SequenceRng::new(vec![1, 2, 3, 4])),
        )
    }

    fn create_command() -> CreateDungeon {
        CreateDungeon {
            correlation_id: Uuid::new_v4(),
            template_id: "crypt".to_owned(),
            theme: "bone".to_owned(),
            location: Some(Location::new(WorldId::new("overworld"), 0.0, 64.0, 0.0)),
            created_by: "P1".to_owned(),
            reason: "party request".to_owned(),
        }
    }

    #[test]
    fn test_handle_create_dungeon_records_reason() {
        // Arrange
        let registry = registry();

        // Act
        let instance = handle_create_dungeon(&create_command(), &registry).unwrap();

        // Assert
        assert_eq!(instance.creation_reason(), "party request");
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_handle_destroy_dungeon_unknown_is_not_found() {
        let registry = registry();
        let command = DestroyDungeon {
            correlation_id: Uuid::new_v4(),
            instance_id: InstanceId::new("crypt-0-000000"),
        };

        let result = handle_destroy_dungeon(&command, &registry);

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_handle_bind_actor_returns_updated_instance() {
        let registry = registry();
        let instance = handle_create_dungeon(&create_command(), &registry).unwrap();
        let actor = ActorId::random();

        let bound = handle_bind_actor(
            &BindActor {
                correlation_id: Uuid::new_v4(),
                actor_id: actor,
                instance_id: instance.id().clone(),
            },
            &registry,
        )
        .unwrap();

        assert!(bound.has_player(&actor));
    }

    #[test]
    fn test_handle_bind_actor_to_creating_instance_is_conflict() {
        let registry = registry();
        let command = create_command();
        let id = registry
            .begin_creation(
                &command.template_id,
                &command.theme,
                command.location.as_ref(),
                &command.created_by,
                &command.reason,
            )
            .unwrap();

        let result = handle_bind_actor(
            &BindActor {
                correlation_id: Uuid::new_v4(),
                actor_id: ActorId::random(),
                instance_id: id,
            },
            &registry,
        );

        assert!(matches!(result, Err(DomainError::StateConflict(_))));
    }

    #[test]
    fn test_handle_unbind_actor_not_bound_is_not_found() {
        let registry = registry();
        let instance = handle_create_dungeon(&create_command(), &registry).unwrap();

        let result = handle_unbind_actor(
            &UnbindActor {
                correlation_id: Uuid::new_v4(),
                actor_id: ActorId::random(),
                instance_id: instance.id().clone(),
            },
            &registry,
        );

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
