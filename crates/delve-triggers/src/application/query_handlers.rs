//! Read-only views of registered triggers.

use chrono::{DateTime, Utc};
use delve_core::error::DomainError;
use delve_core::geometry::Location;
use delve_core::ids::{InstanceId, TriggerId};
use serde::Serialize;

use crate::application::manager::TriggerManager;
use crate::domain::effect::EffectSpec;
use crate::domain::kind::{TriggerKind, TriggerType};
use crate::domain::trigger::Trigger;

/// Snapshot of one trigger, safe to hand out while the table keeps
/// changing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerView {
    /// The trigger identifier.
    pub trigger_id: TriggerId,
    /// Variant name.
    pub trigger_type: TriggerType,
    /// Variant settings.
    pub settings: TriggerKind,
    /// Owning instance; `None` for global triggers.
    pub instance: Option<InstanceId>,
    pub location: Option<Location>,
    /// Radius used for matching.
    pub radius: f64,
    pub cooldown_seconds: i64,
    pub effect: Option<EffectSpec>,
    pub enabled: bool,
    pub active: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub fire_count: u64,
    /// Milliseconds until the trigger may fire again.
    pub cooldown_remaining_ms: i64,
}

impl TriggerView {
    /// Captures `trigger` as seen at `now`.
    #[must_use]
    pub fn capture(trigger: &Trigger, now: DateTime<Utc>) -> Self {
        Self {
            trigger_id: trigger.id().clone(),
            trigger_type: trigger.trigger_type(),
            settings: trigger.kind().clone(),
            instance: trigger.scope().instance_id().cloned(),
            location: trigger.location().cloned(),
            radius: trigger.radius(),
            cooldown_seconds: trigger.cooldown().num_seconds(),
            effect: trigger.effect().cloned(),
            enabled: trigger.state().is_enabled(),
            active: trigger.state().is_active(),
            last_fired_at: trigger.state().last_fired_at(),
            fire_count: trigger.state().fire_count(),
            cooldown_remaining_ms: trigger.cooldown_remaining(now).num_milliseconds(),
        }
    }
}

/// Retrieves a trigger by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no trigger has the id.
pub fn get_trigger_by_id(
    id: &TriggerId,
    manager: &TriggerManager,
) -> Result<TriggerView, DomainError> {
    manager
        .get_trigger(id)
        .ok_or_else(|| DomainError::NotFound(format!("trigger {id}")))
}
