//! Actors as seen by the trigger pipeline.

use serde::{Deserialize, Serialize};

use crate::geometry::Location;
use crate::ids::ActorId;

/// A host entity that can be bound to an instance and initiate triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier.
    pub id: ActorId,
    /// Display name, reported back in trigger results.
    pub name: String,
    /// Current position, if the host supplied one.
    #[serde(default)]
    pub location: Option<Location>,
}

impl Actor {
    /// Creates an actor without a known position.
    #[must_use]
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: None,
        }
    }

    /// Sets the actor's current position.
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}
