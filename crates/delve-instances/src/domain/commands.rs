//! Commands for the instance registry.

use delve_core::command::Command;
use delve_core::geometry::Location;
use delve_core::ids::{ActorId, InstanceId};
use uuid::Uuid;

/// Command to create a dungeon instance from a template.
#[derive(Debug, Clone)]
pub struct CreateDungeon {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Template to instantiate.
    pub template_id: String,
    /// Theme applied to the template.
    pub theme: String,
    /// Anchor point; required.
    pub location: Option<Location>,
    /// Who asked for the instance.
    pub created_by: String,
    /// Free-text reason recorded on the instance.
    pub reason: String,
}

impl Command for CreateDungeon {
    fn command_type(&self) -> &'static str {
        "instances.create_dungeon"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn target(&self) -> String {
        self.template_id.clone()
    }
}

/// Command to destroy a dungeon instance.
#[derive(Debug, Clone)]
pub struct DestroyDungeon {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Instance to destroy.
    pub instance_id: InstanceId,
}

impl Command for DestroyDungeon {
    fn command_type(&self) -> &'static str {
        "instances.destroy_dungeon"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn target(&self) -> String {
        self.instance_id.to_string()
    }
}

/// Command to bind an actor to an instance.
#[derive(Debug, Clone)]
pub struct BindActor {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Actor to bind.
    pub actor_id: ActorId,
    /// Target instance.
    pub instance_id: InstanceId,
}

impl Command for BindActor {
    fn command_type(&self) -> &'static str {
        "instances.bind_actor"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn target(&self) -> String {
        self.instance_id.to_string()
    }
}

/// Command to unbind an actor from an instance.
#[derive(Debug, Clone)]
pub struct UnbindActor {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Actor to unbind.
    pub actor_id: ActorId,
    /// Instance the actor is expected to be in.
    pub instance_id: InstanceId,
}

impl Command for UnbindActor {
    fn command_type(&self) -> &'static str {
        "instances.unbind_actor"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn target(&self) -> String {
        self.instance_id.to_string()
    }
}
