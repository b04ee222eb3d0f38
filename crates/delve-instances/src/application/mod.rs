//! Application layer: command and query handlers over the registry, plus
//! the background tasks that drive it.

pub mod cleanup;
pub mod command_handlers;
pub mod generation;
pub mod query_handlers;
