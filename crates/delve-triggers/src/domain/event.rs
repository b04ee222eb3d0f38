//! World events delivered by the game host.

use std::fmt;

use delve_core::geometry::Location;
use delve_core::ids::TriggerId;
use serde::{Deserialize, Serialize};

/// Discriminant of a [`WorldEvent`], checked before any variant matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BlockBreak,
    BlockPlace,
    Move,
    Interact,
    Redstone,
    Manual,
    Tick,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BlockBreak => "block_break",
            Self::BlockPlace => "block_place",
            Self::Move => "move",
            Self::Interact => "interact",
            Self::Redstone => "redstone",
            Self::Manual => "manual",
            Self::Tick => "tick",
        };
        f.write_str(name)
    }
}

/// A block in the world and what it is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block position.
    pub location: Location,
    /// Material name, e.g. `LEVER`.
    pub material: String,
}

/// Something that happened in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// A block was broken.
    BlockBreak { block: BlockRef },
    /// A block was placed.
    BlockPlace { block: BlockRef },
    /// An actor moved between two positions.
    Move { from: Location, to: Location },
    /// An actor interacted with the world.
    Interact {
        /// Host action name, e.g. `RIGHT_CLICK_BLOCK`.
        action: String,
        /// Block interacted with, if any.
        #[serde(default)]
        block: Option<BlockRef>,
        /// Item in the actor's hand, if any.
        #[serde(default)]
        held_item: Option<String>,
        /// Whether the actor was sneaking.
        #[serde(default)]
        sneaking: bool,
    },
    /// A redstone power level changed.
    Redstone {
        location: Location,
        old_power: u8,
        new_power: u8,
    },
    /// An explicit activation of one trigger.
    Manual { trigger_id: TriggerId },
    /// Periodic tick from the host scheduler.
    Tick,
}

impl WorldEvent {
    /// The event's discriminant.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BlockBreak { .. } => EventKind::BlockBreak,
            Self::BlockPlace { .. } => EventKind::BlockPlace,
            Self::Move { .. } => EventKind::Move,
            Self::Interact { .. } => EventKind::Interact,
            Self::Redstone { .. } => EventKind::Redstone,
            Self::Manual { .. } => EventKind::Manual,
            Self::Tick => EventKind::Tick,
        }
    }

    /// Where the event happened, when the event itself says so.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::BlockBreak { block } | Self::BlockPlace { block } => Some(&block.location),
            Self::Move { to, .. } => Some(to),
            Self::Interact { block, .. } => block.as_ref().map(|b| &b.location),
            Self::Redstone { location, .. } => Some(location),
            Self::Manual { .. } | Self::Tick => None,
        }
    }
}
