//! Dungeon instance registry for Delve.
//!
//! Responsible for the set of live dungeon instances, their spatial
//! footprint, the actor-to-instance bindings, asynchronous generation, and
//! the idle cleanup sweep.

pub mod application;
pub mod domain;
