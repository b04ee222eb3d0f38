//! Domain layer for dungeon instances.

pub mod commands;
pub mod instance;
pub mod registry;
