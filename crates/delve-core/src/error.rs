//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Absence and duplicates are usually surfaced as `bool`/`Option` returns by
/// the registry and trigger manager; these variants exist for the paths that
/// return `Result` and for the API layer's status mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Required input was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An instance, trigger, or actor binding was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An id is already registered.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The target is in a lifecycle state that forbids the operation.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A trigger effect or downstream dispatcher failed.
    #[error("effect fault: {0}")]
    EffectFault(String),

    /// The registry is at its configured instance limit.
    #[error("instance limit of {limit} reached")]
    CapacityExceeded {
        /// The configured maximum number of live instances.
        limit: usize,
    },

    /// A collaborator (generation service, worker pool) failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
