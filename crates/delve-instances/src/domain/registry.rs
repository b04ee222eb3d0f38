//! The instance registry: the single source of truth for live instances.
//!
//! All three indexes (primary store, actor bindings, spatial cells) live in
//! one `RegistryState` behind one `RwLock`. Every logical operation takes the
//! write lock exactly once, so a concurrent reader sees either the state
//! before the operation or the state after it, never a mix.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use delve_core::clock::Clock;
use delve_core::error::DomainError;
use delve_core::generation::InstanceGeometry;
use delve_core::geometry::{Aabb, CellKey, Location};
use delve_core::ids::{ActorId, InstanceId};
use delve_core::rng::DeterministicRng;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::instance::{DungeonInstance, InstanceSpec, LifecycleState};

/// Largest id suffix, six hex digits.
const SUFFIX_MAX: u32 = 0x00FF_FFFF;

/// Attempts at minting an unused id before giving up.
const MINT_ATTEMPTS: usize = 16;

/// Instance defaults supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    /// Maximum number of live instances.
    pub max_instances: usize,
    /// Horizontal half-width of the default boundary.
    pub half_width: f64,
    /// Blocks below the origin in the default boundary.
    pub depth: f64,
    /// Blocks above the origin in the default boundary.
    pub height: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_instances: 64,
            half_width: 48.0,
            depth: 16.0,
            height: 32.0,
        }
    }
}

impl RegistryConfig {
    /// Boundary and spawn used when no generation service is involved, and
    /// as the provisional footprint while generation runs.
    #[must_use]
    pub fn default_geometry(&self, origin: &Location) -> InstanceGeometry {
        InstanceGeometry {
            spawn: origin.offset(0.0, 1.0, 0.0),
            bounds: Aabb::around(origin, self.half_width, self.depth, self.height),
        }
    }
}

/// Counters and sizes exposed to the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Live instances.
    pub live: usize,
    /// Actors currently bound to an instance.
    pub bound_actors: usize,
    /// Occupied spatial cells.
    pub cells: usize,
    /// Instances ever inserted.
    pub total_created: u64,
    /// Instances ever removed.
    pub total_destroyed: u64,
}

struct RegistryState {
    instances: HashMap<InstanceId, DungeonInstance>,
    actors: HashMap<ActorId, InstanceId>,
    cells: HashMap<CellKey, BTreeSet<InstanceId>>,
    total_created: u64,
    total_destroyed: u64,
    rng: Box<dyn DeterministicRng>,
}

impl RegistryState {
    fn index_cells(&mut self, id: &InstanceId, cells: &[CellKey]) {
        for cell in cells {
            self.cells.entry(cell.clone()).or_default().insert(id.clone());
        }
    }

    fn unindex_cells(&mut self, id: &InstanceId, cells: &[CellKey]) {
        for cell in cells {
            if let Some(ids) = self.cells.get_mut(cell) {
                ids.remove(id);
                if ids.is_empty() {
                    self.cells.remove(cell);
                }
            }
        }
    }

    fn mint_id(&mut self, template_id: &str, unix_millis: i64) -> Result<InstanceId, DomainError> {
        for _ in 0..MINT_ATTEMPTS {
            let suffix = self.rng.next_u32_range(0, SUFFIX_MAX);
            let id = InstanceId::mint(template_id, unix_millis, suffix);
            if !self.instances.contains_key(&id) {
                return Ok(id);
            }
            debug!(instance_id = %id, "instance id collision, re-rolling suffix");
        }
        Err(DomainError::Infrastructure(format!(
            "could not mint a unique id for template {template_id}"
        )))
    }

    /// Inserts a fully built instance into every index. All checks run
    /// before the first mutation, so a failure leaves no trace.
    fn insert(&mut self, instance: DungeonInstance, limit: usize) -> Result<(), DomainError> {
        if self.instances.len() >= limit {
            return Err(DomainError::CapacityExceeded { limit });
        }
        if instance.bounds().world != instance.origin().world {
            return Err(DomainError::InvalidArgument(format!(
                "instance boundary is in world {} but origin is in {}",
                instance.bounds().world,
                instance.origin().world
            )));
        }
        if self.instances.contains_key(instance.id()) {
            return Err(DomainError::AlreadyExists(instance.id().to_string()));
        }
        let id = instance.id().clone();
        let cells = instance.cells();
        self.instances.insert(id.clone(), instance);
        self.index_cells(&id, &cells);
        self.total_created += 1;
        Ok(())
    }

    /// Evicts every player, then drops the instance from the spatial index
    /// and the primary store.
    fn remove(&mut self, id: &InstanceId, now: DateTime<Utc>) -> Option<DungeonInstance> {
        let instance = self.instances.get_mut(id)?;
        let players: Vec<ActorId> = instance.players().iter().copied().collect();
        for actor in &players {
            instance.player_exit(*actor, now);
            if self.actors.get(actor) == Some(id) {
                self.actors.remove(actor);
            }
        }
        let cells = instance.cells();
        self.unindex_cells(id, &cells);
        let mut instance = self.instances.remove(id)?;
        instance.destroy();
        self.total_destroyed += 1;
        Some(instance)
    }
}

/// Owns the set of live dungeon instances and their indexes.
pub struct InstanceRegistry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<RegistryState>,
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("InstanceRegistry")
            .field("config", &self.config)
            .field("live", &state.instances.len())
            .field("bound_actors", &state.actors.len())
            .field("total_created", &state.total_created)
            .field("total_destroyed", &state.total_destroyed)
            .finish_non_exhaustive()
    }
}

impl InstanceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(RegistryState {
                instances: HashMap::new(),
                actors: HashMap::new(),
                cells: HashMap::new(),
                total_created: 0,
                total_destroyed: 0,
                rng,
            }),
        }
    }

    /// The configuration the registry was built with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Creates and activates an instance with the default boundary.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the template or theme is
    /// blank, the location is missing or the configured boundary is too
    /// large to index, `DomainError::CapacityExceeded` at the instance limit.
    pub fn create_dungeon(
        &self,
        template_id: &str,
        theme: &str,
        location: Option<&Location>,
        created_by: &str,
    ) -> Result<DungeonInstance, DomainError> {
        self.create_dungeon_with_reason(template_id, theme, location, created_by, "on demand")
    }

    /// [`InstanceRegistry::create_dungeon`] with an explicit creation reason.
    ///
    /// # Errors
    ///
    /// Same as [`InstanceRegistry::create_dungeon`].
    pub fn create_dungeon_with_reason(
        &self,
        template_id: &str,
        theme: &str,
        location: Option<&Location>,
        created_by: &str,
        reason: &str,
    ) -> Result<DungeonInstance, DomainError> {
        let spec = validate_spec(template_id, theme, location, created_by, reason)?;
        let geometry = self.config.default_geometry(&spec.origin);
        geometry.bounds.ensure_indexable()?;
        let now = self.clock.now();

        let mut state = self.state.write();
        let id = state.mint_id(&spec.template_id, now.timestamp_millis())?;
        let mut instance = DungeonInstance::new(id.clone(), spec, geometry, now);
        instance.activate(now);
        let snapshot = instance.clone();
        state.insert(instance, self.config.max_instances)?;
        drop(state);

        info!(instance_id = %id, template_id, theme, created_by, "dungeon instance created");
        Ok(snapshot)
    }

    /// Registers an instance in `Creating` with a provisional boundary so its
    /// layout can be generated off-thread.
    ///
    /// # Errors
    ///
    /// Same as [`InstanceRegistry::create_dungeon`].
    pub fn begin_creation(
        &self,
        template_id: &str,
        theme: &str,
        location: Option<&Location>,
        created_by: &str,
        reason: &str,
    ) -> Result<InstanceId, DomainError> {
        let spec = validate_spec(template_id, theme, location, created_by, reason)?;
        let geometry = self.config.default_geometry(&spec.origin);
        geometry.bounds.ensure_indexable()?;
        let now = self.clock.now();

        let mut state = self.state.write();
        let id = state.mint_id(&spec.template_id, now.timestamp_millis())?;
        state.insert(
            DungeonInstance::new(id.clone(), spec, geometry, now),
            self.config.max_instances,
        )?;
        drop(state);

        debug!(instance_id = %id, template_id, "dungeon creation started");
        Ok(id)
    }

    /// Applies generated geometry and activates an instance started with
    /// [`InstanceRegistry::begin_creation`].
    ///
    /// A completion for an instance that was destroyed in the meantime is
    /// rejected; it never brings the instance back.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the instance is gone,
    /// `DomainError::StateConflict` if it is no longer `Creating`, and
    /// `DomainError::InvalidArgument` if the geometry is in another world or
    /// too large to index.
    pub fn complete_creation(
        &self,
        id: &InstanceId,
        geometry: InstanceGeometry,
    ) -> Result<DungeonInstance, DomainError> {
        geometry.bounds.ensure_indexable()?;
        let now = self.clock.now();
        let mut state = self.state.write();

        let Some(instance) = state.instances.get(id) else {
            warn!(instance_id = %id, "generation finished for an instance that no longer exists");
            return Err(DomainError::NotFound(format!("instance {id}")));
        };
        if instance.state() != LifecycleState::Creating {
            warn!(instance_id = %id, state = ?instance.state(), "generation finished for an instance that is not creating");
            return Err(DomainError::StateConflict(format!(
                "instance {id} is not being created"
            )));
        }
        if geometry.bounds.world != instance.origin().world {
            return Err(DomainError::InvalidArgument(format!(
                "generated boundary for {id} is in world {}",
                geometry.bounds.world
            )));
        }

        let old_cells = instance.cells();
        state.unindex_cells(id, &old_cells);
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("instance {id}")))?;
        instance.apply_geometry(geometry);
        instance.activate(now);
        let new_cells = instance.cells();
        let snapshot = instance.clone();
        state.index_cells(id, &new_cells);
        drop(state);

        info!(instance_id = %id, template_id = snapshot.template_id(), "dungeon instance created");
        Ok(snapshot)
    }

    /// Drops an instance whose generation failed. Only `Creating` instances
    /// are affected.
    pub fn abort_creation(&self, id: &InstanceId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write();
        let creating = state
            .instances
            .get(id)
            .is_some_and(|i| i.state() == LifecycleState::Creating);
        if !creating {
            return false;
        }
        let removed = state.remove(id, now).is_some();
        drop(state);
        if removed {
            info!(instance_id = %id, "dungeon creation aborted");
        }
        removed
    }

    /// Destroys an instance, evicting every bound actor first. Returns
    /// `false` for unknown ids.
    pub fn destroy_dungeon(&self, id: &InstanceId) -> bool {
        let now = self.clock.now();
        let removed = self.state.write().remove(id, now);
        match removed {
            Some(_) => {
                info!(instance_id = %id, "dungeon instance destroyed");
                true
            }
            None => {
                debug!(instance_id = %id, "destroy requested for unknown instance");
                false
            }
        }
    }

    /// Looks up an instance by id.
    #[must_use]
    pub fn get_instance(&self, id: &InstanceId) -> Option<DungeonInstance> {
        self.state.read().instances.get(id).cloned()
    }

    /// The instance an actor is bound to, if any.
    #[must_use]
    pub fn get_instance_for_actor(&self, actor: &ActorId) -> Option<DungeonInstance> {
        let state = self.state.read();
        let id = state.actors.get(actor)?;
        state.instances.get(id).cloned()
    }

    /// The instance whose boundary contains `location`.
    ///
    /// The cell index narrows the candidates; the boundary test decides.
    #[must_use]
    pub fn get_instance_at_location(&self, location: &Location) -> Option<DungeonInstance> {
        let state = self.state.read();
        let candidates = state.cells.get(&location.cell())?;
        candidates
            .iter()
            .filter_map(|id| state.instances.get(id))
            .find(|instance| instance.is_location_in_instance(location))
            .cloned()
    }

    /// Every live instance, oldest first.
    #[must_use]
    pub fn list_instances(&self) -> Vec<DungeonInstance> {
        let mut instances: Vec<DungeonInstance> =
            self.state.read().instances.values().cloned().collect();
        instances.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        instances
    }

    /// Instances indexed under a cell, in id order.
    #[must_use]
    pub fn list_instances_in_cell(&self, cell: &CellKey) -> Vec<DungeonInstance> {
        let state = self.state.read();
        state
            .cells
            .get(cell)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.instances.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Binds an actor to an instance, moving it out of any previous one in
    /// the same critical section.
    ///
    /// Returns `false` and changes nothing if the instance is unknown or not
    /// `Active`.
    pub fn bind_actor(&self, actor: ActorId, id: &InstanceId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write();

        match state.instances.get(id) {
            None => {
                debug!(%actor, instance_id = %id, "bind requested for unknown instance");
                return false;
            }
            Some(instance) if !instance.is_active() => {
                debug!(%actor, instance_id = %id, state = ?instance.state(), "bind rejected, instance not active");
                return false;
            }
            Some(_) => {}
        }
        if state.actors.get(&actor) == Some(id) {
            return true;
        }

        let previous = state.actors.remove(&actor);
        if let Some(old) = &previous {
            if let Some(instance) = state.instances.get_mut(old) {
                instance.player_exit(actor, now);
            }
        }
        let entered = state
            .instances
            .get_mut(id)
            .is_some_and(|instance| instance.player_enter(actor));
        if entered {
            state.actors.insert(actor, id.clone());
        }
        drop(state);

        info!(%actor, instance_id = %id, previous = ?previous, "actor bound to instance");
        entered
    }

    /// Unbinds an actor from `id`. Returns `false` unless the actor was bound
    /// to exactly that instance.
    pub fn unbind_actor(&self, actor: ActorId, id: &InstanceId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write();
        if state.actors.get(&actor) != Some(id) {
            return false;
        }
        state.actors.remove(&actor);
        if let Some(instance) = state.instances.get_mut(id) {
            instance.player_exit(actor, now);
        }
        drop(state);

        info!(%actor, instance_id = %id, "actor unbound from instance");
        true
    }

    /// Unbinds an actor from whatever instance holds it (e.g. on
    /// disconnect). Returns the instance it left.
    pub fn release_actor(&self, actor: ActorId) -> Option<InstanceId> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let id = state.actors.remove(&actor)?;
        if let Some(instance) = state.instances.get_mut(&id) {
            instance.player_exit(actor, now);
        }
        Some(id)
    }

    /// Destroys every active instance that has been empty for at least
    /// `idle_timeout`. Returns the destroyed ids.
    pub fn sweep_idle(&self, idle_timeout: Duration) -> Vec<InstanceId> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let idle: Vec<InstanceId> = state
            .instances
            .values()
            .filter(|instance| instance.is_idle(now, idle_timeout))
            .map(|instance| instance.id().clone())
            .collect();

        let mut destroyed = Vec::with_capacity(idle.len());
        for id in idle {
            if state.remove(&id, now).is_some() {
                destroyed.push(id);
            } else {
                warn!(instance_id = %id, "idle instance vanished during sweep");
            }
        }
        drop(state);

        if !destroyed.is_empty() {
            info!(count = destroyed.len(), "idle dungeon instances destroyed");
        }
        destroyed
    }

    /// Destroys every live instance. Keeps going past instances that cannot
    /// be removed; returns how many were destroyed.
    pub fn shutdown(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write();
        let ids: Vec<InstanceId> = state.instances.keys().cloned().collect();
        let mut destroyed = 0;
        for id in ids {
            if state.remove(&id, now).is_some() {
                destroyed += 1;
            } else {
                warn!(instance_id = %id, "instance could not be destroyed during shutdown");
            }
        }
        drop(state);

        info!(destroyed, "instance registry shut down");
        destroyed
    }

    /// Number of live instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.state.read().instances.len()
    }

    /// Instances ever inserted.
    #[must_use]
    pub fn total_created(&self) -> u64 {
        self.state.read().total_created
    }

    /// Instances ever removed.
    #[must_use]
    pub fn total_destroyed(&self) -> u64 {
        self.state.read().total_destroyed
    }

    /// Counters and index sizes from one consistent read.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            live: state.instances.len(),
            bound_actors: state.actors.len(),
            cells: state.cells.len(),
            total_created: state.total_created,
            total_destroyed: state.total_destroyed,
        }
    }

    /// Verifies that the three indexes agree with each other.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistency found.
    pub fn check_consistency(&self) -> Result<(), String> {
        let state = self.state.read();

        for (id, instance) in &state.instances {
            if instance.state() == LifecycleState::Destroyed {
                return Err(format!("destroyed instance {id} still stored"));
            }
            for cell in instance.cells() {
                if !state.cells.get(&cell).is_some_and(|ids| ids.contains(id)) {
                    return Err(format!("instance {id} missing from cell {cell:?}"));
                }
            }
            for actor in instance.players() {
                if state.actors.get(actor) != Some(id) {
                    return Err(format!("player {actor} of {id} not mapped to it"));
                }
            }
        }
        for (cell, ids) in &state.cells {
            if ids.is_empty() {
                return Err(format!("empty cell {cell:?} left in index"));
            }
            for id in ids {
                let Some(instance) = state.instances.get(id) else {
                    return Err(format!("cell {cell:?} lists unknown instance {id}"));
                };
                if !instance.cells().contains(cell) {
                    return Err(format!("cell {cell:?} lists {id} outside its boundary"));
                }
            }
        }
        for (actor, id) in &state.actors {
            if !state.instances.get(id).is_some_and(|i| i.has_player(actor)) {
                return Err(format!("actor {actor} mapped to {id} but not a member"));
            }
        }
        Ok(())
    }
}

fn validate_spec(
    template_id: &str,
    theme: &str,
    location: Option<&Location>,
    created_by: &str,
    reason: &str,
) -> Result<InstanceSpec, DomainError> {
    if template_id.trim().is_empty() {
        return Err(DomainError::InvalidArgument(
            "template id must not be empty".to_owned(),
        ));
    }
    if theme.trim().is_empty() {
        return Err(DomainError::InvalidArgument(
            "theme must not be empty".to_owned(),
        ));
    }
    let Some(origin) = location else {
        return Err(DomainError::InvalidArgument(
            "location is required".to_owned(),
        ));
    };
    Ok(InstanceSpec {
        template_id: template_id.to_owned(),
        theme: theme.to_owned(),
        origin: origin.clone(),
        created_by: created_by.to_owned(),
        creation_reason: reason.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::geometry::WorldId;
    use delve_test_support::{FixedClock, ManualClock, MockRng, SequenceRng, fixed_now};

    fn overworld(x: f64, y: f64, z: f64) -> Location {
        Location::new(WorldId::new("overworld"), x, y, z)
    }

    fn small_config() -> RegistryConfig {
        RegistryConfig {
            max_instances: 8,
            half_width: 20.0,
            depth: 4.0,
            height: 8.0,
        }
    }

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(
            small_config(),
            Arc::new(FixedClock(fixed_now())),
            Box::new(SequenceRng::new((1..=64).collect())),
        )
    }

    #[test]
    fn test_create_dungeon_activates_and_indexes_instance() {
        // Arrange
        let registry = registry();
        let origin = overworld(8.0, 64.0, 8.0);

        // Act
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&origin), "P1")
            .unwrap();

        // Assert
        assert_eq!(instance.state(), LifecycleState::Active);
        assert_eq!(instance.template_id(), "crypt");
        assert_eq!(instance.created_by(), "P1");
        assert!(instance.id().as_str().starts_with("crypt-"));
        assert_eq!(registry.total_created(), 1);
        assert_eq!(
            registry.get_instance(instance.id()).unwrap().id(),
            instance.id()
        );
        for cell in instance.cells() {
            let listed = registry.list_instances_in_cell(&cell);
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].id(), instance.id());
        }
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_create_dungeon_rejects_missing_inputs() {
        let registry = registry();
        let origin = overworld(0.0, 0.0, 0.0);

        let blank_template = registry.create_dungeon(" ", "bone", Some(&origin), "P1");
        let blank_theme = registry.create_dungeon("crypt", "", Some(&origin), "P1");
        let no_location = registry.create_dungeon("crypt", "bone", None, "P1");

        for result in [blank_template, blank_theme, no_location] {
            assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        }
        assert_eq!(registry.instance_count(), 0);
        assert_eq!(registry.total_created(), 0);
    }

    #[test]
    fn test_create_dungeon_enforces_instance_limit() {
        let registry = InstanceRegistry::new(
            RegistryConfig {
                max_instances: 1,
                ..small_config()
            },
            Arc::new(FixedClock(fixed_now())),
            Box::new(SequenceRng::new(vec![1, 2])),
        );
        let origin = overworld(0.0, 0.0, 0.0);
        registry
            .create_dungeon("crypt", "bone", Some(&origin), "P1")
            .unwrap();

        let result = registry.create_dungeon("crypt", "bone", Some(&origin), "P2");

        assert_eq!(result.unwrap_err(), DomainError::CapacityExceeded { limit: 1 });
        assert_eq!(registry.instance_count(), 1);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_colliding_suffix_is_rerolled() {
        // Arrange: same timestamp and a repeated suffix force a collision.
        let registry = InstanceRegistry::new(
            small_config(),
            Arc::new(FixedClock(fixed_now())),
            Box::new(SequenceRng::new(vec![5, 5, 9])),
        );
        let origin = overworld(0.0, 0.0, 0.0);

        // Act
        let first = registry
            .create_dungeon("crypt", "bone", Some(&origin), "P1")
            .unwrap();
        let second = registry
            .create_dungeon("crypt", "bone", Some(&origin.offset(500.0, 0.0, 0.0)), "P1")
            .unwrap();

        // Assert
        assert_ne!(first.id(), second.id());
        assert!(second.id().as_str().ends_with("-000009"));
    }

    #[test]
    fn test_mint_gives_up_when_every_suffix_collides() {
        let registry = InstanceRegistry::new(
            small_config(),
            Arc::new(FixedClock(fixed_now())),
            Box::new(MockRng),
        );
        let origin = overworld(0.0, 0.0, 0.0);
        registry
            .create_dungeon("crypt", "bone", Some(&origin), "P1")
            .unwrap();

        let result = registry.create_dungeon("crypt", "bone", Some(&origin), "P1");

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_get_instance_at_location_uses_precise_boundary() {
        let registry = registry();
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&overworld(8.0, 64.0, 8.0)), "P1")
            .unwrap();

        // Inside the box, in a far cell of its footprint.
        let far_corner = overworld(27.0, 70.0, 27.0);
        assert_eq!(
            registry.get_instance_at_location(&far_corner).unwrap().id(),
            instance.id()
        );
        // Same cell as the box edge but above its ceiling.
        assert!(registry.get_instance_at_location(&overworld(8.0, 90.0, 8.0)).is_none());
        // Same coordinates, different world.
        let nether = Location::new(WorldId::new("nether"), 8.0, 64.0, 8.0);
        assert!(registry.get_instance_at_location(&nether).is_none());
    }

    #[test]
    fn test_bind_actor_moves_between_instances_atomically() {
        // Arrange
        let registry = registry();
        let first = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let second = registry
            .create_dungeon("vault", "gold", Some(&overworld(500.0, 0.0, 0.0)), "P1")
            .unwrap();
        let actor = ActorId::random();

        // Act
        assert!(registry.bind_actor(actor, first.id()));
        assert!(registry.bind_actor(actor, second.id()));

        // Assert
        assert_eq!(
            registry.get_instance_for_actor(&actor).unwrap().id(),
            second.id()
        );
        assert!(!registry.get_instance(first.id()).unwrap().has_player(&actor));
        assert!(registry.get_instance(second.id()).unwrap().has_player(&actor));
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_bind_actor_to_unknown_instance_keeps_existing_binding() {
        let registry = registry();
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let actor = ActorId::random();
        registry.bind_actor(actor, instance.id());

        let bound = registry.bind_actor(actor, &InstanceId::new("missing"));

        assert!(!bound);
        assert_eq!(
            registry.get_instance_for_actor(&actor).unwrap().id(),
            instance.id()
        );
    }

    #[test]
    fn test_bind_actor_rejects_creating_instance() {
        let registry = registry();
        let id = registry
            .begin_creation("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1", "party")
            .unwrap();
        let actor = ActorId::random();

        assert!(!registry.bind_actor(actor, &id));
        assert!(registry.get_instance_for_actor(&actor).is_none());
        assert!(registry.get_instance(&id).unwrap().players().is_empty());
    }

    #[test]
    fn test_rebinding_to_same_instance_is_noop() {
        let registry = registry();
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let actor = ActorId::random();

        assert!(registry.bind_actor(actor, instance.id()));
        assert!(registry.bind_actor(actor, instance.id()));

        assert_eq!(registry.get_instance(instance.id()).unwrap().players().len(), 1);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_unbind_actor_requires_matching_instance() {
        let registry = registry();
        let first = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let second = registry
            .create_dungeon("vault", "gold", Some(&overworld(500.0, 0.0, 0.0)), "P1")
            .unwrap();
        let actor = ActorId::random();
        registry.bind_actor(actor, first.id());

        assert!(!registry.unbind_actor(actor, second.id()));
        assert!(registry.unbind_actor(actor, first.id()));
        assert!(!registry.unbind_actor(actor, first.id()));
        assert!(registry.get_instance_for_actor(&actor).is_none());
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_release_actor_returns_previous_instance() {
        let registry = registry();
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let actor = ActorId::random();
        registry.bind_actor(actor, instance.id());

        assert_eq!(registry.release_actor(actor), Some(instance.id().clone()));
        assert_eq!(registry.release_actor(actor), None);
    }

    #[test]
    fn test_destroy_dungeon_removes_all_traces() {
        // Arrange
        let registry = registry();
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&overworld(8.0, 64.0, 8.0)), "P1")
            .unwrap();
        let actors = [ActorId::random(), ActorId::random()];
        for actor in actors {
            assert!(registry.bind_actor(actor, instance.id()));
        }

        // Act
        let destroyed = registry.destroy_dungeon(instance.id());

        // Assert
        assert!(destroyed);
        assert!(registry.get_instance(instance.id()).is_none());
        for actor in actors {
            assert!(registry.get_instance_for_actor(&actor).is_none());
        }
        for cell in instance.cells() {
            assert!(registry.list_instances_in_cell(&cell).is_empty());
        }
        assert_eq!(registry.stats().cells, 0);
        assert_eq!(registry.total_destroyed(), 1);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_destroy_unknown_instance_returns_false() {
        let registry = registry();

        assert!(!registry.destroy_dungeon(&InstanceId::new("nope")));
        assert_eq!(registry.total_destroyed(), 0);
    }

    #[test]
    fn test_overlapping_cells_keep_other_instance_indexed() {
        let registry = registry();
        let a = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let b = registry
            .create_dungeon("vault", "gold", Some(&overworld(30.0, 100.0, 0.0)), "P1")
            .unwrap();
        let shared: Vec<CellKey> = a
            .cells()
            .into_iter()
            .filter(|c| b.cells().contains(c))
            .collect();
        assert!(!shared.is_empty());

        registry.destroy_dungeon(a.id());

        for cell in shared {
            let listed = registry.list_instances_in_cell(&cell);
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].id(), b.id());
        }
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_complete_creation_reindexes_generated_boundary() {
        // Arrange
        let registry = registry();
        let origin = overworld(0.0, 64.0, 0.0);
        let id = registry
            .begin_creation("crypt", "bone", Some(&origin), "P1", "party")
            .unwrap();
        let geometry = InstanceGeometry {
            spawn: origin.offset(0.0, 1.0, 0.0),
            bounds: Aabb::around(&origin, 100.0, 4.0, 4.0),
        };

        // Act
        let instance = registry.complete_creation(&id, geometry).unwrap();

        // Assert
        assert_eq!(instance.state(), LifecycleState::Active);
        assert_eq!(
            registry
                .get_instance_at_location(&overworld(95.0, 64.0, -95.0))
                .unwrap()
                .id(),
            &id
        );
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_complete_creation_rejects_oversized_boundary() {
        // Arrange
        let registry = registry();
        let origin = overworld(0.0, 64.0, 0.0);
        let id = registry
            .begin_creation("crypt", "bone", Some(&origin), "P1", "party")
            .unwrap();
        let geometry = InstanceGeometry {
            spawn: origin.offset(0.0, 1.0, 0.0),
            bounds: Aabb::around(&origin, 1_000_000.0, 4.0, 4.0),
        };

        // Act
        let result = registry.complete_creation(&id, geometry);

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        let instance = registry.get_instance(&id).unwrap();
        assert_eq!(instance.state(), LifecycleState::Creating);
        assert_eq!(instance.bounds(), &small_config().default_geometry(&origin).bounds);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_create_dungeon_rejects_oversized_default_boundary() {
        let registry = InstanceRegistry::new(
            RegistryConfig {
                half_width: 1_000_000.0,
                ..small_config()
            },
            Arc::new(FixedClock(fixed_now())),
            Box::new(SequenceRng::new(vec![1])),
        );

        let result = registry.create_dungeon("crypt", "bone", Some(&overworld(0.0, 64.0, 0.0)), "P1");

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        assert_eq!(registry.instance_count(), 0);
        assert_eq!(registry.total_created(), 0);
    }

    #[test]
    fn test_completion_after_destroy_does_not_resurrect() {
        let registry = registry();
        let origin = overworld(0.0, 64.0, 0.0);
        let id = registry
            .begin_creation("crypt", "bone", Some(&origin), "P1", "party")
            .unwrap();
        assert!(registry.destroy_dungeon(&id));

        let result = registry.complete_creation(&id, small_config().default_geometry(&origin));

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(registry.get_instance(&id).is_none());
        assert!(registry.get_instance_at_location(&origin).is_none());
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_completion_for_active_instance_is_state_conflict() {
        let registry = registry();
        let origin = overworld(0.0, 64.0, 0.0);
        let instance = registry
            .create_dungeon("crypt", "bone", Some(&origin), "P1")
            .unwrap();

        let result =
            registry.complete_creation(instance.id(), small_config().default_geometry(&origin));

        assert!(matches!(result, Err(DomainError::StateConflict(_))));
    }

    #[test]
    fn test_abort_creation_only_touches_creating_instances() {
        let registry = registry();
        let origin = overworld(0.0, 64.0, 0.0);
        let creating = registry
            .begin_creation("crypt", "bone", Some(&origin), "P1", "party")
            .unwrap();
        let active = registry
            .create_dungeon("vault", "gold", Some(&origin.offset(500.0, 0.0, 0.0)), "P1")
            .unwrap();

        assert!(!registry.abort_creation(active.id()));
        assert!(registry.abort_creation(&creating));
        assert!(registry.get_instance(&creating).is_none());
        assert!(registry.get_instance(active.id()).is_some());
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_sweep_idle_destroys_only_empty_expired_instances() {
        // Arrange
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let registry = InstanceRegistry::new(
            small_config(),
            clock.clone(),
            Box::new(SequenceRng::new(vec![1, 2])),
        );
        let empty = registry
            .create_dungeon("crypt", "bone", Some(&overworld(0.0, 0.0, 0.0)), "P1")
            .unwrap();
        let occupied = registry
            .create_dungeon("vault", "gold", Some(&overworld(500.0, 0.0, 0.0)), "P1")
            .unwrap();
        registry.bind_actor(ActorId::random(), occupied.id());

        // Act
        clock.advance(Duration::minutes(4));
        let early = registry.sweep_idle(Duration::minutes(5));
        clock.advance(Duration::minutes(1));
        let swept = registry.sweep_idle(Duration::minutes(5));

        // Assert
        assert!(early.is_empty());
        assert_eq!(swept, vec![empty.id().clone()]);
        assert!(registry.get_instance(occupied.id()).is_some());
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_shutdown_destroys_everything() {
        let registry = registry();
        let actor = ActorId::random();
        for i in 0..3 {
            let instance = registry
                .create_dungeon("crypt", "bone", Some(&overworld(f64::from(i) * 500.0, 0.0, 0.0)), "P1")
                .unwrap();
            registry.bind_actor(actor, instance.id());
        }

        let destroyed = registry.shutdown();

        assert_eq!(destroyed, 3);
        assert_eq!(registry.instance_count(), 0);
        assert!(registry.get_instance_for_actor(&actor).is_none());
        assert_eq!(registry.stats().total_destroyed, 3);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_concurrent_mutation_keeps_indexes_consistent() {
        use std::thread;

        let registry = Arc::new(InstanceRegistry::new(
            RegistryConfig {
                max_instances: 1_000,
                ..small_config()
            },
            Arc::new(FixedClock(fixed_now())),
            Box::new(delve_core::rng::SystemRng::seeded(11)),
        ));
        let actors: Vec<ActorId> = (0..8).map(|_| ActorId::random()).collect();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                let actors = actors.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let origin = overworld(f64::from(t * 1_000 + i * 10), 0.0, 0.0);
                        let Ok(instance) =
                            registry.create_dungeon("crypt", "bone", Some(&origin), "worker")
                        else {
                            continue;
                        };
                        let actor = actors[usize::try_from(i).unwrap() % actors.len()];
                        registry.bind_actor(actor, instance.id());
                        if i % 3 == 0 {
                            registry.destroy_dungeon(instance.id());
                        }
                    }
                })
            })
            .collect();
        let reader = {
            let registry = Arc::clone(&registry);
            let actors = actors.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    for actor in &actors {
                        if let Some(instance) = registry.get_instance_for_actor(actor) {
                            assert!(instance.has_player(actor));
                        }
                    }
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        registry.check_consistency().unwrap();
        let stats = registry.stats();
        assert_eq!(
            stats.total_created - stats.total_destroyed,
            u64::try_from(stats.live).unwrap()
        );
        assert!(stats.bound_actors <= actors.len());
    }
}
