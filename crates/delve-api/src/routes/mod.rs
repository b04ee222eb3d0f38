//! Route modules organized by resource.

pub mod actors;
pub mod dungeons;
pub mod events;
pub mod health;
pub mod triggers;
