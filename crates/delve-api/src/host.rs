//! Collaborators used when the service runs without an attached game host.
//!
//! Effects and actor messages are written to the log instead of being
//! carried out in a world.

use delve_core::error::DomainError;
use delve_core::execution::{ActorMessenger, ExecutionContext, FunctionDispatcher};
use delve_core::ids::ActorId;
use serde_json::{Map, Value};
use tracing::info;

/// Dispatcher that logs every effect and reports it as done.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

impl FunctionDispatcher for LoggingDispatcher {
    fn dispatch(
        &self,
        function_id: &str,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError> {
        info!(
            function = function_id,
            actor = context.actor_name(),
            instance_id = ?context.instance_id,
            "effect dispatched"
        );
        let mut data = Map::new();
        data.insert("function".to_owned(), Value::from(function_id));
        Ok(data)
    }
}

/// Messenger that logs messages addressed to actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMessenger;

impl ActorMessenger for LoggingMessenger {
    fn send_message(&self, actor: &ActorId, message: &str) {
        info!(actor_id = %actor, message, "message to actor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_dispatcher_echoes_function_id() {
        let data = LoggingDispatcher
            .dispatch("open_gate", &ExecutionContext::new())
            .unwrap();

        assert_eq!(data["function"], "open_gate");
    }
}
