//! Query handlers for the instance registry.
//!
//! This module returns read-only view DTOs built from registry snapshots.

use chrono::{DateTime, Utc};
use delve_core::error::DomainError;
use delve_core::geometry::{Aabb, Location};
use delve_core::ids::{ActorId, InstanceId};
use serde::Serialize;

use crate::domain::instance::{DungeonInstance, LifecycleState};
use crate::domain::registry::{InstanceRegistry, RegistryStats};

/// Read-only view of a dungeon instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    /// The instance identifier.
    pub instance_id: InstanceId,
    /// Template the instance was built from.
    pub template_id: String,
    /// Theme name.
    pub theme: String,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Anchor point.
    pub origin: Location,
    /// Where entering players are placed.
    pub spawn: Location,
    /// Boundary region.
    pub bounds: Aabb,
    /// Actors inside, in id order.
    pub players: Vec<ActorId>,
    /// Who created the instance.
    pub created_by: String,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// Why the instance was created.
    pub creation_reason: String,
}

impl From<&DungeonInstance> for InstanceView {
    fn from(instance: &DungeonInstance) -> Self {
        Self {
            instance_id: instance.id().clone(),
            template_id: instance.template_id().to_owned(),
            theme: instance.theme().to_owned(),
            state: instance.state(),
            origin: instance.origin().clone(),
            spawn: instance.spawn().clone(),
            bounds: instance.bounds().clone(),
            players: instance.players().iter().copied().collect(),
            created_by: instance.created_by().to_owned(),
            created_at: instance.created_at(),
            creation_reason: instance.creation_reason().to_owned(),
        }
    }
}

/// Retrieves an instance by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no live instance has the id.
pub fn get_instance_by_id(
    id: &InstanceId,
    registry: &InstanceRegistry,
) -> Result<InstanceView, DomainError> {
    registry
        .get_instance(id)
        .map(|instance| InstanceView::from(&instance))
        .ok_or_else(|| DomainError::NotFound(format!("instance {id}")))
}

/// Retrieves the instance an actor is bound to.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the actor is not bound.
pub fn get_instance_for_actor(
    actor: &ActorId,
    registry: &InstanceRegistry,
) -> Result<InstanceView, DomainError> {
    registry
        .get_instance_for_actor(actor)
        .map(|instance| InstanceView::from(&instance))
        .ok_or_else(|| DomainError::NotFound(format!("binding for actor {actor}")))
}

/// Lists every live instance, oldest first.
#[must_use]
pub fn list_instances(registry: &InstanceRegistry) -> Vec<InstanceView> {
    registry.list_instances().iter().map(InstanceView::from).collect()
}

/// Registry counters and index sizes.
#[must_use]
pub fn get_registry_stats(registry: &InstanceRegistry) -> RegistryStats {
    registry.stats()
}
