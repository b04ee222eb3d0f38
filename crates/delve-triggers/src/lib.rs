//! Event-triggered execution pipeline.
//!
//! Responsible for matching world events against registered triggers,
//! enforcing cooldowns, and running trigger effects either inline or on a
//! worker pool whose completions are applied back on the caller's thread.

pub mod application;
pub mod domain;
