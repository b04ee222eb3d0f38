//! A registered trigger: what it reacts to, where, how often, and what it
//! runs when it fires.

use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Duration, Utc};
use delve_core::actor::Actor;
use delve_core::error::DomainError;
use delve_core::execution::{ExecutionContext, TriggerResult, timestamp_value};
use delve_core::geometry::Location;
use delve_core::ids::{InstanceId, TriggerId};
use delve_instances::domain::instance::DungeonInstance;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::effect::{EffectJob, EffectSpec, Effects, ExecutionMode, into_fault, panic_message};
use super::event::{EventKind, WorldEvent};
use super::kind::{DEFAULT_RADIUS, TriggerKind, TriggerType, contains_ignore_case};
use super::state::TriggerState;

/// Message sent by manual triggers without a configured template.
pub const DEFAULT_MANUAL_MESSAGE: &str = "Trigger {trigger} activated";

/// Which dispatches a trigger takes part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerScope {
    /// Every dispatch, with or without an instance.
    Global,
    /// Only dispatches resolved to this instance.
    Instance(InstanceId),
}

impl TriggerScope {
    /// Whether a dispatch for `instance` considers this trigger at all.
    #[must_use]
    pub fn covers(&self, instance: Option<&DungeonInstance>) -> bool {
        match self {
            Self::Global => true,
            Self::Instance(id) => instance.is_some_and(|i| i.id() == id),
        }
    }

    /// The owning instance, for instance-scoped triggers.
    #[must_use]
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            Self::Global => None,
            Self::Instance(id) => Some(id),
        }
    }
}

/// A trigger and its runtime state.
#[derive(Debug, Clone)]
pub struct Trigger {
    id: TriggerId,
    kind: TriggerKind,
    scope: TriggerScope,
    location: Option<Location>,
    radius: Option<f64>,
    cooldown: Duration,
    effect: Option<EffectSpec>,
    state: TriggerState,
}

impl Trigger {
    /// A global, unanchored trigger with no cooldown and no effect.
    #[must_use]
    pub fn new(id: TriggerId, kind: TriggerKind) -> Self {
        Self {
            id,
            kind,
            scope: TriggerScope::Global,
            location: None,
            radius: None,
            cooldown: Duration::zero(),
            effect: None,
            state: TriggerState::default(),
        }
    }

    /// Restricts the trigger to one instance.
    #[must_use]
    pub fn scoped_to(mut self, instance_id: InstanceId) -> Self {
        self.scope = TriggerScope::Instance(instance_id);
        self
    }

    /// Anchors the trigger at a location.
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Overrides the matching radius around the anchor.
    #[must_use]
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Minimum time between two fires.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the function run on fire.
    #[must_use]
    pub fn with_effect(mut self, function: impl Into<String>, mode: ExecutionMode) -> Self {
        self.effect = Some(EffectSpec {
            function: function.into(),
            mode,
        });
        self
    }

    /// Starts the trigger disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.state.set_enabled(false);
        self
    }

    /// Unique id within the manager.
    #[must_use]
    pub fn id(&self) -> &TriggerId {
        &self.id
    }

    /// Variant and its settings.
    #[must_use]
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        self.kind.trigger_type()
    }

    /// Global, or bound to one instance.
    #[must_use]
    pub fn scope(&self) -> &TriggerScope {
        &self.scope
    }

    /// Anchor location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Configured radius, if any.
    #[must_use]
    pub fn configured_radius(&self) -> Option<f64> {
        self.radius
    }

    /// Radius used for matching.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius.unwrap_or(DEFAULT_RADIUS)
    }

    /// Minimum time between two fires.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Function run on fire, if any.
    #[must_use]
    pub fn effect(&self) -> Option<&EffectSpec> {
        self.effect.as_ref()
    }

    /// Enable flags and fire history.
    #[must_use]
    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    /// Operator switch; a disabled trigger never fires.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    /// Eligibility switch driven by the owning instance.
    pub fn set_active(&mut self, active: bool) {
        self.state.set_active(active);
    }

    /// Clears the last-fired time.
    pub fn reset_cooldown(&mut self) {
        self.state.reset_cooldown();
    }

    /// Time until the trigger may fire again.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Duration {
        self.state.cooldown_remaining(now, self.cooldown)
    }

    /// Whether events of `kind` can match this trigger.
    #[must_use]
    pub fn accepts(&self, kind: EventKind) -> bool {
        self.trigger_type().accepts(kind)
    }

    /// Global triggers always pass; instance triggers need their own
    /// instance, and it must be active.
    #[must_use]
    pub fn scope_matches(&self, instance: Option<&DungeonInstance>) -> bool {
        match &self.scope {
            TriggerScope::Global => true,
            TriggerScope::Instance(id) => {
                instance.is_some_and(|i| i.id() == id && i.is_active())
            }
        }
    }

    /// Distance from the anchor; infinite across worlds, zero when
    /// unanchored.
    fn anchor_distance(&self, location: &Location) -> f64 {
        self.location
            .as_ref()
            .map_or(0.0, |anchor| anchor.distance(location).unwrap_or(f64::INFINITY))
    }

    fn within_radius(&self, location: &Location) -> bool {
        self.anchor_distance(location) <= self.radius()
    }

    /// Pure predicate: does `event` satisfy this trigger's variant?
    #[must_use]
    pub fn matches_event(
        &self,
        actor: Option<&Actor>,
        event: &WorldEvent,
        instance: Option<&DungeonInstance>,
    ) -> bool {
        match (&self.kind, event) {
            (TriggerKind::BlockBreak { materials }, WorldEvent::BlockBreak { block })
            | (TriggerKind::BlockPlace { materials }, WorldEvent::BlockPlace { block }) => {
                (materials.is_empty() || contains_ignore_case(materials, &block.material))
                    && self.within_radius(&block.location)
            }
            (TriggerKind::PlayerEnter, WorldEvent::Move { from, to }) => {
                self.location.is_some()
                    && self.anchor_distance(from) > self.radius()
                    && self.anchor_distance(to) <= self.radius()
            }
            (TriggerKind::PlayerLeave, WorldEvent::Move { from, to }) => {
                self.location.is_some()
                    && self.anchor_distance(from) <= self.radius()
                    && self.anchor_distance(to) > self.radius()
            }
            (TriggerKind::PlayerMove, WorldEvent::Move { to, .. }) => self.within_radius(to),
            (
                TriggerKind::PlayerInteract(filter),
                WorldEvent::Interact {
                    action,
                    block,
                    held_item,
                    sneaking,
                },
            ) => {
                if !filter.admits(
                    action,
                    block.as_ref().map(|b| b.material.as_str()),
                    held_item.as_deref(),
                    *sneaking,
                ) {
                    return false;
                }
                if self.location.is_none() {
                    return true;
                }
                let point = block
                    .as_ref()
                    .map(|b| &b.location)
                    .or_else(|| actor.and_then(|a| a.location.as_ref()));
                point.is_some_and(|p| self.anchor_distance(p) <= filter.interaction_range)
            }
            (
                TriggerKind::RedstoneChange { rising_edge_only },
                WorldEvent::Redstone {
                    location,
                    old_power,
                    new_power,
                },
            ) => {
                let changed = old_power != new_power;
                let edge_ok = !*rising_edge_only || (*old_power == 0 && *new_power > 0);
                changed && edge_ok && self.within_radius(location)
            }
            (TriggerKind::Manual { .. }, WorldEvent::Manual { trigger_id }) => {
                *trigger_id == self.id
            }
            (TriggerKind::TimeInterval, WorldEvent::Tick) => true,
            (TriggerKind::ConditionMet { condition }, WorldEvent::Tick) => {
                condition.holds(instance)
            }
            _ => false,
        }
    }

    /// Enabled, active, off cooldown, in scope, and matching.
    #[must_use]
    pub fn check_conditions(
        &self,
        actor: Option<&Actor>,
        event: &WorldEvent,
        instance: Option<&DungeonInstance>,
        now: DateTime<Utc>,
    ) -> bool {
        self.state.is_enabled()
            && self.state.is_active()
            && self.state.cooldown_elapsed(now, self.cooldown)
            && self.scope_matches(instance)
            && self.matches_event(actor, event, instance)
    }

    /// Runs the trigger's effect and reports the outcome. Never panics
    /// outward: dispatcher errors and panics become failed results.
    ///
    /// Only a successful fire starts the cooldown.
    pub fn fire(
        &mut self,
        actor: Option<&Actor>,
        event: &WorldEvent,
        instance: Option<&DungeonInstance>,
        now: DateTime<Utc>,
        effects: &Effects<'_>,
    ) -> TriggerResult {
        let mut data = self.result_data(actor, instance, now);
        let context = self.execution_context(actor, event, instance, now);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_effect(actor, instance, context, effects)
        }))
        .unwrap_or_else(|payload| {
            Err(DomainError::EffectFault(format!(
                "trigger {} panicked: {}",
                self.id,
                panic_message(payload.as_ref())
            )))
        });

        match outcome {
            Ok(output) => {
                data.extend(output);
                self.state.record_fire(now);
                debug!(trigger_id = %self.id, fire_count = self.state.fire_count(), "trigger fired");
                TriggerResult::success(format!("Trigger {} fired", self.id), data)
            }
            Err(err) => {
                warn!(trigger_id = %self.id, error = %err, "trigger effect failed");
                TriggerResult::failure(format!("Trigger {} failed", self.id), data, &err)
            }
        }
    }

    fn result_data(
        &self,
        actor: Option<&Actor>,
        instance: Option<&DungeonInstance>,
        now: DateTime<Utc>,
    ) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("trigger_id".to_owned(), Value::from(self.id.as_str()));
        data.insert(
            "trigger_type".to_owned(),
            Value::from(self.trigger_type().as_str()),
        );
        data.insert("timestamp".to_owned(), timestamp_value(now));
        if let Some(actor) = actor {
            data.insert("player".to_owned(), Value::from(actor.name.as_str()));
        }
        if let Some(instance) = instance {
            data.insert("instance".to_owned(), Value::from(instance.id().as_str()));
        }
        data
    }

    fn execution_context(
        &self,
        actor: Option<&Actor>,
        event: &WorldEvent,
        instance: Option<&DungeonInstance>,
        now: DateTime<Utc>,
    ) -> ExecutionContext {
        let location = event
            .location()
            .or_else(|| actor.and_then(|a| a.location.as_ref()))
            .cloned();
        ExecutionContext::new()
            .with_actor(actor.cloned())
            .with_location(location)
            .with_instance(instance.map(|i| i.id().clone()))
            .with_value("trigger_id", self.id.as_str())
            .with_value("event", event.kind().to_string())
            .with_value("timestamp", timestamp_value(now))
    }

    fn run_effect(
        &self,
        actor: Option<&Actor>,
        instance: Option<&DungeonInstance>,
        context: ExecutionContext,
        effects: &Effects<'_>,
    ) -> Result<Map<String, Value>, DomainError> {
        let mut output = Map::new();

        if let TriggerKind::Manual { message } = &self.kind {
            let text = render_message(
                message.as_deref().unwrap_or(DEFAULT_MANUAL_MESSAGE),
                &self.id,
                actor,
                instance,
            );
            if let Some(actor) = actor {
                effects.messenger.send_message(&actor.id, &text);
            }
            output.insert("message".to_owned(), Value::from(text));
        }

        let Some(effect) = &self.effect else {
            return Ok(output);
        };
        match effect.mode {
            ExecutionMode::Sync => {
                let produced = effects
                    .dispatcher
                    .dispatch(&effect.function, &context)
                    .map_err(|err| into_fault(&effect.function, err))?;
                output.extend(produced);
            }
            ExecutionMode::Async => {
                let scheduler = effects.scheduler.ok_or_else(|| {
                    DomainError::EffectFault(format!(
                        "no worker pool for async function {}",
                        effect.function
                    ))
                })?;
                let ticket = scheduler.schedule(EffectJob {
                    trigger_id: self.id.clone(),
                    function: effect.function.clone(),
                    actor: actor.map(|a| a.id),
                    context,
                })?;
                output.insert("scheduled".to_owned(), Value::Bool(true));
                output.insert("ticket".to_owned(), Value::from(ticket.0));
            }
        }
        Ok(output)
    }
}

/// Fills `{player}`, `{trigger}` and `{instance}` in a message template.
#[must_use]
pub fn render_message(
    template: &str,
    trigger_id: &TriggerId,
    actor: Option<&Actor>,
    instance: Option<&DungeonInstance>,
) -> String {
    template
        .replace("{player}", actor.map_or("someone", |a| a.name.as_str()))
        .replace("{trigger}", trigger_id.as_str())
        .replace("{instance}", instance.map_or("", |i| i.id().as_str()))
}
