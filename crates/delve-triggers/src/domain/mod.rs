//! Domain layer for triggers.

pub mod definition;
pub mod effect;
pub mod event;
pub mod kind;
pub mod state;
pub mod trigger;
