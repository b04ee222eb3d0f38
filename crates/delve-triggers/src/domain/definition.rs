//! Persisted trigger records.
//!
//! Trigger files are YAML documents with a top-level `triggers` list; the
//! HTTP API accepts the same record shape as JSON. Keys are kebab-case and
//! unknown keys are ignored.
//!
//! ```yaml
//! triggers:
//!   - id: vault-lever
//!     type: PLAYER_INTERACT
//!     location: { world: overworld, x: 10, y: 64, z: -3 }
//!     cooldown-seconds: 30
//!     function: open_vault
//!     target-materials: [LEVER]
//!     required-items: [IRON_KEY]
//! ```

use std::collections::BTreeSet;

use chrono::Duration;
use delve_core::error::DomainError;
use delve_core::geometry::Location;
use delve_core::ids::{InstanceId, TriggerId};
use serde::{Deserialize, Serialize};

use super::effect::ExecutionMode;
use super::kind::{DEFAULT_INTERACTION_RANGE, InteractFilter, TriggerKind, TriggerType, WorldCondition};
use super::trigger::{Trigger, TriggerScope};

/// Longest cooldown a record may ask for: one year.
pub const MAX_COOLDOWN_SECONDS: u64 = 365 * 24 * 60 * 60;

fn default_true() -> bool {
    true
}

/// One trigger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub cooldown_seconds: u64,
    /// Owning instance; absent for global triggers.
    #[serde(default)]
    pub instance: Option<InstanceId>,
    /// Function run on fire.
    #[serde(default)]
    pub function: Option<String>,
    /// Run `function` on the worker pool.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    #[serde(default)]
    pub target_materials: Vec<String>,
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    #[serde(default)]
    pub require_sneaking: bool,
    #[serde(default)]
    pub required_items: Vec<String>,
    #[serde(default)]
    pub interaction_range: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub rising_edge_only: bool,
    #[serde(default)]
    pub condition: WorldCondition,
}

#[derive(Debug, Deserialize)]
struct TriggerFile {
    #[serde(default)]
    triggers: Vec<TriggerDefinition>,
}

/// Parses a trigger file.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the document is not valid YAML
/// or a record is missing `id` or `type`.
pub fn load_definitions(yaml: &str) -> Result<Vec<TriggerDefinition>, DomainError> {
    let file: TriggerFile = serde_yaml::from_str(yaml)
        .map_err(|e| DomainError::InvalidArgument(format!("trigger file: {e}")))?;
    Ok(file.triggers)
}

fn positive(name: &str, value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DomainError::InvalidArgument(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

impl TriggerDefinition {
    /// Builds the runtime trigger described by this record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank id or function, a
    /// negative or non-finite radius or range, an oversized cooldown, or an
    /// async record without a function.
    pub fn into_trigger(self) -> Result<Trigger, DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "trigger id must not be empty".to_owned(),
            ));
        }
        let function = match self.function {
            Some(f) if f.trim().is_empty() => {
                return Err(DomainError::InvalidArgument(format!(
                    "trigger {} has a blank function",
                    self.id
                )));
            }
            other => other,
        };
        if self.run_async && function.is_none() {
            return Err(DomainError::InvalidArgument(format!(
                "trigger {} is async but has no function",
                self.id
            )));
        }
        let cooldown = i64::try_from(self.cooldown_seconds)
            .ok()
            .filter(|_| self.cooldown_seconds <= MAX_COOLDOWN_SECONDS)
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                DomainError::InvalidArgument(format!(
                    "cooldown of {} seconds exceeds the maximum of {MAX_COOLDOWN_SECONDS}",
                    self.cooldown_seconds
                ))
            })?;

        let kind = match self.trigger_type {
            TriggerType::BlockBreak => TriggerKind::BlockBreak {
                materials: self.target_materials.into_iter().collect(),
            },
            TriggerType::BlockPlace => TriggerKind::BlockPlace {
                materials: self.target_materials.into_iter().collect(),
            },
            TriggerType::PlayerEnter => TriggerKind::PlayerEnter,
            TriggerType::PlayerLeave => TriggerKind::PlayerLeave,
            TriggerType::PlayerMove => TriggerKind::PlayerMove,
            TriggerType::PlayerInteract => TriggerKind::PlayerInteract(InteractFilter {
                allowed_actions: self.allowed_actions.into_iter().collect(),
                require_sneaking: self.require_sneaking,
                target_materials: self.target_materials.into_iter().collect(),
                required_items: self.required_items.into_iter().collect::<BTreeSet<_>>(),
                interaction_range: positive(
                    "interaction-range",
                    self.interaction_range.unwrap_or(DEFAULT_INTERACTION_RANGE),
                )?,
            }),
            TriggerType::RedstoneChange => TriggerKind::RedstoneChange {
                rising_edge_only: self.rising_edge_only,
            },
            TriggerType::TimeInterval => TriggerKind::TimeInterval,
            TriggerType::ConditionMet => TriggerKind::ConditionMet {
                condition: self.condition,
            },
            TriggerType::Manual => TriggerKind::Manual {
                message: self.message,
            },
        };

        let mut trigger = Trigger::new(TriggerId::new(self.id), kind).with_cooldown(cooldown);
        if let Some(instance) = self.instance {
            trigger = trigger.scoped_to(instance);
        }
        if let Some(location) = self.location {
            trigger = trigger.at(location);
        }
        if let Some(radius) = self.radius {
            trigger = trigger.with_radius(positive("radius", radius)?);
        }
        if let Some(function) = function {
            let mode = if self.run_async {
                ExecutionMode::Async
            } else {
                ExecutionMode::Sync
            };
            trigger = trigger.with_effect(function, mode);
        }
        if !self.enabled {
            trigger = trigger.disabled();
        }
        Ok(trigger)
    }
}

impl From<&Trigger> for TriggerDefinition {
    fn from(trigger: &Trigger) -> Self {
        let mut definition = Self {
            id: trigger.id().to_string(),
            trigger_type: trigger.trigger_type(),
            enabled: trigger.state().is_enabled(),
            location: trigger.location().cloned(),
            radius: trigger.configured_radius(),
            cooldown_seconds: u64::try_from(trigger.cooldown().num_seconds()).unwrap_or(0),
            instance: match trigger.scope() {
                TriggerScope::Global => None,
                TriggerScope::Instance(id) => Some(id.clone()),
            },
            function: trigger.effect().map(|e| e.function.clone()),
            run_async: trigger
                .effect()
                .is_some_and(|e| e.mode == ExecutionMode::Async),
            target_materials: Vec::new(),
            allowed_actions: Vec::new(),
            require_sneaking: false,
            required_items: Vec::new(),
            interaction_range: None,
            message: None,
            rising_edge_only: false,
            condition: WorldCondition::Always,
        };
        match trigger.kind() {
            TriggerKind::BlockBreak { materials } | TriggerKind::BlockPlace { materials } => {
                definition.target_materials = materials.iter().cloned().collect();
            }
            TriggerKind::PlayerInteract(filter) => {
                definition.allowed_actions = filter.allowed_actions.iter().cloned().collect();
                definition.require_sneaking = filter.require_sneaking;
                definition.target_materials = filter.target_materials.iter().cloned().collect();
                definition.required_items = filter.required_items.iter().cloned().collect();
                definition.interaction_range = Some(filter.interaction_range);
            }
            TriggerKind::RedstoneChange { rising_edge_only } => {
                definition.rising_edge_only = *rising_edge_only;
            }
            TriggerKind::ConditionMet { condition } => definition.condition = *condition,
            TriggerKind::Manual { message } => definition.message.clone_from(message),
            TriggerKind::PlayerEnter
            | TriggerKind::PlayerLeave
            | TriggerKind::PlayerMove
            | TriggerKind::TimeInterval => {}
        }
        definition
    }
}
