//! Delve Core: shared domain abstractions.
//!
//! This crate defines the identifiers, geometry, result envelope, and
//! collaborator traits that the instance registry and the trigger pipeline
//! both depend on. It contains no infrastructure code.

pub mod actor;
pub mod clock;
pub mod command;
pub mod error;
pub mod execution;
pub mod generation;
pub mod geometry;
pub mod ids;
pub mod rng;
