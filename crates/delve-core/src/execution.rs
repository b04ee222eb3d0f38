//! Execution context and result envelope shared by triggers and the
//! function dispatcher, plus the dispatcher/messenger contracts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::actor::Actor;
use crate::error::DomainError;
use crate::geometry::Location;
use crate::ids::{ActorId, InstanceId};

/// Everything an effect needs to know about why it is running.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionContext {
    /// Initiating actor; `None` for ticks and other host-initiated events.
    pub actor: Option<Actor>,
    /// Where the event happened, if anywhere.
    pub location: Option<Location>,
    /// Instance the event was resolved to; `None` for global dispatch.
    pub instance_id: Option<InstanceId>,
    /// Free-form values (trigger id, event kind, timestamp, ...).
    pub payload: Map<String, Value>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initiating actor.
    #[must_use]
    pub fn with_actor(mut self, actor: Option<Actor>) -> Self {
        self.actor = actor;
        self
    }

    /// Sets the event location.
    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Sets the instance reference.
    #[must_use]
    pub fn with_instance(mut self, instance_id: Option<InstanceId>) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Adds a payload entry.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_owned(), value.into());
        self
    }

    /// Display name of the actor, if any.
    #[must_use]
    pub fn actor_name(&self) -> Option<&str> {
        self.actor.as_ref().map(|a| a.name.as_str())
    }
}

/// Outcome of one trigger fire. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerResult {
    success: bool,
    message: String,
    data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TriggerResult {
    /// A successful result.
    #[must_use]
    pub fn success(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }

    /// A failed result carrying its cause.
    #[must_use]
    pub fn failure(message: impl Into<String>, data: Map<String, Value>, cause: &DomainError) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
            error: Some(cause.to_string()),
        }
    }

    /// Whether the effect succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Human-readable message for the calling layer.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured result data.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Looks up one data entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Failure cause, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Performs the game action behind a trigger's effect id.
///
/// Called on the dispatching thread for synchronous effects and on a worker
/// thread for asynchronous ones. Implementations must not call back into the
/// trigger manager.
pub trait FunctionDispatcher: Send + Sync {
    /// Runs `function_id` and returns values to merge into the result data.
    ///
    /// # Errors
    ///
    /// Any error is reported as a failed `TriggerResult`; it never aborts
    /// dispatch of other triggers.
    fn dispatch(
        &self,
        function_id: &str,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError>;
}

/// Delivers text to an actor. Owned by the host runtime.
pub trait ActorMessenger: Send + Sync {
    /// Sends `message` to `actor`.
    fn send_message(&self, actor: &ActorId, message: &str);
}

/// Dispatcher for hosts that register no functions: every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl FunctionDispatcher for NoopDispatcher {
    fn dispatch(
        &self,
        function_id: &str,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError> {
        Err(DomainError::NotFound(format!("function {function_id}")))
    }
}

/// Messenger that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMessenger;

impl ActorMessenger for NoopMessenger {
    fn send_message(&self, _actor: &ActorId, _message: &str) {}
}

/// RFC 3339 rendering used for timestamps inside result data.
#[must_use]
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_records_cause() {
        let cause = DomainError::EffectFault("lever jammed".into());

        let result = TriggerResult::failure("trigger gate failed", Map::new(), &cause);

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("effect fault: lever jammed"));
    }

    #[test]
    fn test_success_serializes_without_error_field() {
        let mut data = Map::new();
        data.insert("player".into(), Value::from("P1"));

        let json = serde_json::to_value(TriggerResult::success("ok", data)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["player"], "P1");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_noop_dispatcher_reports_unknown_function() {
        let err = NoopDispatcher
            .dispatch("open_gate", &ExecutionContext::new())
            .unwrap_err();

        assert_eq!(err, DomainError::NotFound("function open_gate".into()));
    }
}
