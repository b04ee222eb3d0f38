//! The dungeon instance: a bounded region with a lifecycle and a player set.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use delve_core::generation::InstanceGeometry;
use delve_core::geometry::{Aabb, CellKey, Location};
use delve_core::ids::{ActorId, InstanceId};
use serde::{Deserialize, Serialize};

/// Lifecycle of an instance. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Registered, layout possibly still generating.
    Creating,
    /// Open for players.
    Active,
    /// Teardown in progress.
    Destroying,
    /// Gone; unreachable from every registry index.
    Destroyed,
}

/// Provenance and placement requested for a new instance.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    /// Blueprint the instance is built from.
    pub template_id: String,
    /// Theme applied to the blueprint.
    pub theme: String,
    /// Anchor point of the instance.
    pub origin: Location,
    /// Who asked for it (player name, "system", ...).
    pub created_by: String,
    /// Why it was created.
    pub creation_reason: String,
}

/// One live occurrence of a dungeon.
#[derive(Debug, Clone, Serialize)]
pub struct DungeonInstance {
    id: InstanceId,
    template_id: String,
    theme: String,
    origin: Location,
    spawn: Location,
    bounds: Aabb,
    state: LifecycleState,
    players: BTreeSet<ActorId>,
    created_by: String,
    created_at: DateTime<Utc>,
    creation_reason: String,
    empty_since: Option<DateTime<Utc>>,
}

impl DungeonInstance {
    /// Builds an instance in the `Creating` state.
    #[must_use]
    pub fn new(
        id: InstanceId,
        spec: InstanceSpec,
        geometry: InstanceGeometry,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            template_id: spec.template_id,
            theme: spec.theme,
            origin: spec.origin,
            spawn: geometry.spawn,
            bounds: geometry.bounds,
            state: LifecycleState::Creating,
            players: BTreeSet::new(),
            created_by: spec.created_by,
            created_at,
            creation_reason: spec.creation_reason,
            empty_since: None,
        }
    }

    /// Instance identifier.
    #[must_use]
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Template the instance was generated from.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Theme name.
    #[must_use]
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Anchor point.
    #[must_use]
    pub fn origin(&self) -> &Location {
        &self.origin
    }

    /// Where entering players are placed.
    #[must_use]
    pub fn spawn(&self) -> &Location {
        &self.spawn
    }

    /// Boundary region.
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether players may enter.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Actors currently inside.
    #[must_use]
    pub fn players(&self) -> &BTreeSet<ActorId> {
        &self.players
    }

    /// Whether `actor` is inside.
    #[must_use]
    pub fn has_player(&self, actor: &ActorId) -> bool {
        self.players.contains(actor)
    }

    /// Who created the instance.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// When the instance was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Why the instance was created.
    #[must_use]
    pub fn creation_reason(&self) -> &str {
        &self.creation_reason
    }

    /// When the instance last became empty, if it is empty and active.
    #[must_use]
    pub fn empty_since(&self) -> Option<DateTime<Utc>> {
        self.empty_since
    }

    /// Every spatial cell the boundary intersects.
    #[must_use]
    pub fn cells(&self) -> Vec<CellKey> {
        self.bounds.cells()
    }

    /// World identity check plus boundary containment.
    #[must_use]
    pub fn is_location_in_instance(&self, location: &Location) -> bool {
        self.bounds.contains(location)
    }

    /// Adds a player. Returns `false` without side effects unless `Active`.
    pub fn player_enter(&mut self, actor: ActorId) -> bool {
        if !self.is_active() {
            return false;
        }
        self.players.insert(actor);
        self.empty_since = None;
        true
    }

    /// Removes a player. Removing an absent player is a no-op; returns
    /// whether the player was present.
    pub fn player_exit(&mut self, actor: ActorId, now: DateTime<Utc>) -> bool {
        let removed = self.players.remove(&actor);
        if removed && self.players.is_empty() && self.is_active() {
            self.empty_since = Some(now);
        }
        removed
    }

    /// Tears the instance down: `Destroying`, then `Destroyed`, with the
    /// player set cleared. Returns the players that were still inside.
    pub fn destroy(&mut self) -> Vec<ActorId> {
        self.state = LifecycleState::Destroying;
        let evicted = std::mem::take(&mut self.players).into_iter().collect();
        self.empty_since = None;
        self.state = LifecycleState::Destroyed;
        evicted
    }

    /// True when the instance is active, empty, and has been empty for at
    /// least `idle_timeout`.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        self.is_active()
            && self.players.is_empty()
            && self
                .empty_since
                .is_some_and(|since| now - since >= idle_timeout)
    }

    /// `Creating` → `Active`. Returns `false` from any other state.
    pub(crate) fn activate(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != LifecycleState::Creating {
            return false;
        }
        self.state = LifecycleState::Active;
        if self.players.is_empty() {
            self.empty_since = Some(now);
        }
        true
    }

    /// Replaces the provisional layout with the generated one. Only valid
    /// while `Creating`; the boundary is fixed from activation on.
    pub(crate) fn apply_geometry(&mut self, geometry: InstanceGeometry) {
        debug_assert_eq!(self.state, LifecycleState::Creating);
        self.spawn = geometry.spawn;
        self.bounds = geometry.bounds;
    }
}
