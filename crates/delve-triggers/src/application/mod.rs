//! Application layer: the trigger manager, its read views, and the worker
//! pool for asynchronous effects.

pub mod manager;
pub mod query_handlers;
pub mod worker;
