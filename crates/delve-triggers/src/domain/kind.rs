//! Trigger variants and the event kinds each one accepts.

use std::collections::BTreeSet;
use std::fmt;

use delve_instances::domain::instance::DungeonInstance;
use serde::{Deserialize, Serialize};

use super::event::EventKind;

/// Radius used by proximity triggers that do not configure one.
pub const DEFAULT_RADIUS: f64 = 3.0;

/// Reach used by interact triggers that do not configure one.
pub const DEFAULT_INTERACTION_RANGE: f64 = 5.0;

/// Discriminant of a [`TriggerKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    BlockBreak,
    BlockPlace,
    PlayerEnter,
    PlayerLeave,
    PlayerMove,
    PlayerInteract,
    RedstoneChange,
    TimeInterval,
    ConditionMet,
    Manual,
}

impl TriggerType {
    /// Whether events of `kind` can ever match triggers of this type.
    #[must_use]
    pub fn accepts(self, kind: EventKind) -> bool {
        matches!(
            (self, kind),
            (Self::BlockBreak, EventKind::BlockBreak)
                | (Self::BlockPlace, EventKind::BlockPlace)
                | (
                    Self::PlayerEnter | Self::PlayerLeave | Self::PlayerMove,
                    EventKind::Move
                )
                | (Self::PlayerInteract, EventKind::Interact)
                | (Self::RedstoneChange, EventKind::Redstone)
                | (Self::Manual, EventKind::Manual)
                | (Self::TimeInterval | Self::ConditionMet, EventKind::Tick)
        )
    }

    /// Wire name, as used in trigger files and result data.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockBreak => "BLOCK_BREAK",
            Self::BlockPlace => "BLOCK_PLACE",
            Self::PlayerEnter => "PLAYER_ENTER",
            Self::PlayerLeave => "PLAYER_LEAVE",
            Self::PlayerMove => "PLAYER_MOVE",
            Self::PlayerInteract => "PLAYER_INTERACT",
            Self::RedstoneChange => "REDSTONE_CHANGE",
            Self::TimeInterval => "TIME_INTERVAL",
            Self::ConditionMet => "CONDITION_MET",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance-level condition evaluated by `CONDITION_MET` triggers on each
/// tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorldCondition {
    /// Always holds.
    #[default]
    Always,
    /// The instance holds at least this many players.
    MinPlayers(usize),
    /// The instance is empty, or there is no instance.
    NoPlayers,
}

impl WorldCondition {
    /// Evaluates the condition against the dispatch instance.
    #[must_use]
    pub fn holds(self, instance: Option<&DungeonInstance>) -> bool {
        match self {
            Self::Always => true,
            Self::MinPlayers(n) => instance.is_some_and(|i| i.players().len() >= n),
            Self::NoPlayers => instance.is_none_or(|i| i.players().is_empty()),
        }
    }
}

/// Filters applied by `PLAYER_INTERACT` triggers. Empty sets place no
/// constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractFilter {
    /// Accepted host action names.
    pub allowed_actions: BTreeSet<String>,
    /// Only fire while sneaking.
    pub require_sneaking: bool,
    /// Accepted block materials.
    pub target_materials: BTreeSet<String>,
    /// Items one of which must be held.
    pub required_items: BTreeSet<String>,
    /// Maximum distance from the anchor to the interaction point.
    pub interaction_range: f64,
}

impl Default for InteractFilter {
    fn default() -> Self {
        Self {
            allowed_actions: BTreeSet::new(),
            require_sneaking: false,
            target_materials: BTreeSet::new(),
            required_items: BTreeSet::new(),
            interaction_range: DEFAULT_INTERACTION_RANGE,
        }
    }
}

impl InteractFilter {
    /// Checks action, sneaking, material and held item. Distance is checked
    /// by the trigger, which owns the anchor.
    #[must_use]
    pub fn admits(
        &self,
        action: &str,
        material: Option<&str>,
        held_item: Option<&str>,
        sneaking: bool,
    ) -> bool {
        if !self.allowed_actions.is_empty() && !contains_ignore_case(&self.allowed_actions, action) {
            return false;
        }
        if self.require_sneaking && !sneaking {
            return false;
        }
        if !self.target_materials.is_empty()
            && !material.is_some_and(|m| contains_ignore_case(&self.target_materials, m))
        {
            return false;
        }
        if !self.required_items.is_empty()
            && !held_item.is_some_and(|item| contains_ignore_case(&self.required_items, item))
        {
            return false;
        }
        true
    }
}

/// Case-insensitive membership; materials and actions arrive in whatever
/// case the host uses.
pub(crate) fn contains_ignore_case(set: &BTreeSet<String>, value: &str) -> bool {
    set.iter().any(|entry| entry.eq_ignore_ascii_case(value))
}

/// The closed set of trigger behaviours. Fields that only one variant uses
/// live inside that variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    BlockBreak {
        /// Accepted materials; empty accepts any.
        materials: BTreeSet<String>,
    },
    BlockPlace {
        /// Accepted materials; empty accepts any.
        materials: BTreeSet<String>,
    },
    PlayerEnter,
    PlayerLeave,
    PlayerMove,
    PlayerInteract(InteractFilter),
    RedstoneChange {
        /// Only fire when power goes from zero to positive.
        rising_edge_only: bool,
    },
    TimeInterval,
    ConditionMet {
        /// Condition checked on each tick.
        condition: WorldCondition,
    },
    Manual {
        /// Message template sent to the activating actor.
        message: Option<String>,
    },
}

impl TriggerKind {
    /// The variant's discriminant.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::BlockBreak { .. } => TriggerType::BlockBreak,
            Self::BlockPlace { .. } => TriggerType::BlockPlace,
            Self::PlayerEnter => TriggerType::PlayerEnter,
            Self::PlayerLeave => TriggerType::PlayerLeave,
            Self::PlayerMove => TriggerType::PlayerMove,
            Self::PlayerInteract(_) => TriggerType::PlayerInteract,
            Self::RedstoneChange { .. } => TriggerType::RedstoneChange,
            Self::TimeInterval => TriggerType::TimeInterval,
            Self::ConditionMet { .. } => TriggerType::ConditionMet,
            Self::Manual { .. } => TriggerType::Manual,
        }
    }
}
