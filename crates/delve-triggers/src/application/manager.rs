//! The trigger manager: the registration table and event dispatch.
//!
//! The whole table sits behind one mutex that is held for an entire
//! `handle_event` call, so registration changes never interleave with a
//! dispatch. Dispatchers run under that lock and must not call back into the
//! manager; effects that need to should use async mode.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use delve_core::actor::Actor;
use delve_core::clock::Clock;
use delve_core::execution::{ActorMessenger, FunctionDispatcher, TriggerResult};
use delve_core::ids::{InstanceId, TriggerId};
use delve_instances::domain::instance::DungeonInstance;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::application::query_handlers::TriggerView;
use crate::domain::definition::TriggerDefinition;
use crate::domain::effect::{EffectScheduler, Effects};
use crate::domain::event::WorldEvent;
use crate::domain::trigger::Trigger;

/// Triggers in registration order.
#[derive(Default)]
struct TriggerTable {
    order: Vec<TriggerId>,
    triggers: HashMap<TriggerId, Trigger>,
}

impl TriggerTable {
    fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.order.iter().filter_map(|id| self.triggers.get(id))
    }

    fn remove(&mut self, id: &TriggerId) -> Option<Trigger> {
        let removed = self.triggers.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Ids of the triggers that pass every check, in registration order.
    fn passers(
        &self,
        event: &WorldEvent,
        actor: Option<&Actor>,
        instance: Option<&DungeonInstance>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<TriggerId> {
        let kind = event.kind();
        self.iter()
            .filter(|t| t.scope().covers(instance) && t.accepts(kind))
            .filter(|t| t.check_conditions(actor, event, instance, now))
            .map(|t| t.id().clone())
            .collect()
    }
}

/// Owns every registered trigger and dispatches world events to them.
pub struct TriggerManager {
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn FunctionDispatcher>,
    messenger: Arc<dyn ActorMessenger>,
    scheduler: Option<Arc<dyn EffectScheduler>>,
    table: Mutex<TriggerTable>,
}

impl fmt::Debug for TriggerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerManager")
            .field("triggers", &self.table.lock().order.len())
            .field("scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

impl TriggerManager {
    /// Creates a manager without a worker pool; async effects fail until
    /// one is attached with [`TriggerManager::with_scheduler`].
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn FunctionDispatcher>,
        messenger: Arc<dyn ActorMessenger>,
    ) -> Self {
        Self {
            clock,
            dispatcher,
            messenger,
            scheduler: None,
            table: Mutex::new(TriggerTable::default()),
        }
    }

    /// Attaches the scheduler used for async effects.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn EffectScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Adds a trigger. Returns `false` and keeps the existing one if the id
    /// is already registered.
    pub fn register_trigger(&self, trigger: Trigger) -> bool {
        let mut table = self.table.lock();
        if table.triggers.contains_key(trigger.id()) {
            warn!(trigger_id = %trigger.id(), "duplicate trigger id, registration ignored");
            return false;
        }
        let id = trigger.id().clone();
        info!(trigger_id = %id, trigger_type = %trigger.trigger_type(), "trigger registered");
        table.order.push(id.clone());
        table.triggers.insert(id, trigger);
        true
    }

    /// Registers every valid definition, skipping (and logging) invalid
    /// records and duplicates. Returns how many were registered.
    pub fn register_definitions(&self, definitions: Vec<TriggerDefinition>) -> usize {
        let mut registered = 0;
        for definition in definitions {
            let id = definition.id.clone();
            match definition.into_trigger() {
                Ok(trigger) => {
                    if self.register_trigger(trigger) {
                        registered += 1;
                    }
                }
                Err(err) => warn!(trigger_id = %id, error = %err, "skipping invalid trigger definition"),
            }
        }
        registered
    }

    /// Removes a trigger. Returns `false` for unknown ids.
    pub fn unregister_trigger(&self, id: &TriggerId) -> bool {
        let removed = self.table.lock().remove(id).is_some();
        if removed {
            info!(trigger_id = %id, "trigger unregistered");
        }
        removed
    }

    /// Removes every trigger scoped to `instance_id`.
    pub fn unregister_dungeon_triggers(&self, instance_id: &InstanceId) -> usize {
        let mut table = self.table.lock();
        let doomed: Vec<TriggerId> = table
            .iter()
            .filter(|t| t.scope().instance_id() == Some(instance_id))
            .map(|t| t.id().clone())
            .collect();
        for id in &doomed {
            table.remove(id);
        }
        drop(table);
        if !doomed.is_empty() {
            info!(instance_id = %instance_id, count = doomed.len(), "instance triggers unregistered");
        }
        doomed.len()
    }

    #[must_use]
    pub fn get_trigger(&self, id: &TriggerId) -> Option<TriggerView> {
        let now = self.clock.now();
        self.table
            .lock()
            .triggers
            .get(id)
            .map(|t| TriggerView::capture(t, now))
    }

    /// Every trigger, in registration order.
    #[must_use]
    pub fn list_triggers(&self) -> Vec<TriggerView> {
        let now = self.clock.now();
        self.table
            .lock()
            .iter()
            .map(|t| TriggerView::capture(t, now))
            .collect()
    }

    /// Triggers scoped to one instance, in registration order.
    #[must_use]
    pub fn get_dungeon_triggers(&self, instance_id: &InstanceId) -> Vec<TriggerView> {
        let now = self.clock.now();
        self.table
            .lock()
            .iter()
            .filter(|t| t.scope().instance_id() == Some(instance_id))
            .map(|t| TriggerView::capture(t, now))
            .collect()
    }

    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.table.lock().order.len()
    }

    /// Sets the operator enable switch. Returns `false` for unknown ids.
    pub fn set_enabled(&self, id: &TriggerId, enabled: bool) -> bool {
        let mut table = self.table.lock();
        let Some(trigger) = table.triggers.get_mut(id) else {
            return false;
        };
        trigger.set_enabled(enabled);
        info!(trigger_id = %id, enabled, "trigger enable switch changed");
        true
    }

    /// Clears a trigger's cooldown. Returns `false` for unknown ids.
    pub fn reset_cooldown(&self, id: &TriggerId) -> bool {
        let mut table = self.table.lock();
        let Some(trigger) = table.triggers.get_mut(id) else {
            return false;
        };
        trigger.reset_cooldown();
        debug!(trigger_id = %id, "trigger cooldown reset");
        true
    }

    /// Flips `active` on every trigger scoped to `instance_id`. Returns how
    /// many triggers changed.
    pub fn set_instance_active(&self, instance_id: &InstanceId, active: bool) -> usize {
        let mut table = self.table.lock();
        let mut changed = 0;
        for trigger in table.triggers.values_mut() {
            if trigger.scope().instance_id() == Some(instance_id)
                && trigger.state().is_active() != active
            {
                trigger.set_active(active);
                changed += 1;
            }
        }
        drop(table);
        debug!(instance_id = %instance_id, active, changed, "instance triggers toggled");
        changed
    }

    /// Ids of the triggers that would fire for this event right now. Has no
    /// side effects.
    #[must_use]
    pub fn would_fire(
        &self,
        event: &WorldEvent,
        actor: Option<&Actor>,
        instance: Option<&DungeonInstance>,
    ) -> Vec<TriggerId> {
        let now = self.clock.now();
        self.table.lock().passers(event, actor, instance, now)
    }

    /// Dispatches one event.
    ///
    /// Every candidate is checked against a single `now` before anything
    /// fires, then the passing triggers fire in registration order. A
    /// failing or panicking effect yields a failed result and dispatch moves
    /// on, so the result list always has one entry per passing trigger.
    pub fn handle_event(
        &self,
        event: &WorldEvent,
        actor: Option<&Actor>,
        instance: Option<&DungeonInstance>,
    ) -> Vec<TriggerResult> {
        let now = self.clock.now();
        let effects = Effects {
            dispatcher: self.dispatcher.as_ref(),
            messenger: self.messenger.as_ref(),
            scheduler: self.scheduler.as_deref(),
        };

        let mut table = self.table.lock();
        let passers = table.passers(event, actor, instance, now);
        debug!(
            event = %event.kind(),
            instance_id = ?instance.map(DungeonInstance::id),
            passers = passers.len(),
            "dispatching world event"
        );

        let mut results = Vec::with_capacity(passers.len());
        for id in &passers {
            if let Some(trigger) = table.triggers.get_mut(id) {
                results.push(trigger.fire(actor, event, instance, now, &effects));
            }
        }
        results
    }
}
