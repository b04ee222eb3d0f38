//! Trigger effects: what runs when a trigger fires, and the seam to the
//! worker pool that runs asynchronous effects.

use std::any::Any;
use std::fmt;

use delve_core::error::DomainError;
use delve_core::execution::{ActorMessenger, ExecutionContext, FunctionDispatcher};
use delve_core::ids::{ActorId, TriggerId};
use serde::{Deserialize, Serialize};

/// Where an effect runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Inline, on the dispatching thread.
    #[default]
    Sync,
    /// On the worker pool; the outcome arrives on the completion queue.
    Async,
}

/// The function a trigger invokes and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Function id resolved by the dispatcher.
    pub function: String,
    /// Inline or pooled.
    pub mode: ExecutionMode,
}

/// Identifier of one asynchronous effect execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An effect handed to a scheduler.
#[derive(Debug, Clone)]
pub struct EffectJob {
    /// Trigger that fired.
    pub trigger_id: TriggerId,
    /// Function to run.
    pub function: String,
    /// Actor to report back to.
    pub actor: Option<ActorId>,
    /// Snapshot of the dispatch context.
    pub context: ExecutionContext,
}

/// Accepts asynchronous effects for later execution.
pub trait EffectScheduler: Send + Sync {
    /// Queues `job` and returns its ticket without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the job cannot be queued.
    fn schedule(&self, job: EffectJob) -> Result<Ticket, DomainError>;
}

/// Collaborators a trigger needs while firing.
#[derive(Clone, Copy)]
pub struct Effects<'a> {
    /// Runs synchronous effects.
    pub dispatcher: &'a dyn FunctionDispatcher,
    /// Delivers manual-trigger messages.
    pub messenger: &'a dyn ActorMessenger,
    /// Accepts asynchronous effects; `None` when no pool is configured.
    pub scheduler: Option<&'a dyn EffectScheduler>,
}

impl fmt::Debug for Effects<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effects")
            .field("scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

/// Normalises a dispatcher error into an effect fault naming the function.
#[must_use]
pub fn into_fault(function: &str, err: DomainError) -> DomainError {
    match err {
        DomainError::EffectFault(_) => err,
        other => DomainError::EffectFault(format!("{function}: {other}")),
    }
}

/// Best-effort text of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_fault_keeps_existing_fault() {
        let err = into_fault("open_gate", DomainError::EffectFault("jammed".into()));

        assert_eq!(err, DomainError::EffectFault("jammed".into()));
    }

    #[test]
    fn test_into_fault_wraps_other_errors() {
        let err = into_fault("open_gate", DomainError::NotFound("function open_gate".into()));

        assert_eq!(
            err,
            DomainError::EffectFault("open_gate: not found: function open_gate".into())
        );
    }

    #[test]
    fn test_panic_message_reads_string_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("lever {}", 3)).unwrap_err();

        assert_eq!(panic_message(payload.as_ref()), "lever 3");
    }
}
