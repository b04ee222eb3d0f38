//! Test dispatchers and messengers.

use std::sync::Mutex;

use delve_core::error::DomainError;
use delve_core::execution::{ActorMessenger, ExecutionContext, FunctionDispatcher};
use delve_core::ids::ActorId;
use serde_json::{Map, Value};

/// A dispatcher that records every call and succeeds, echoing the function
/// id back as `function` in the returned data.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<(String, ExecutionContext)>>,
}

impl RecordingDispatcher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<(String, ExecutionContext)> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the recorded function ids in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn function_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl FunctionDispatcher for RecordingDispatcher {
    fn dispatch(
        &self,
        function_id: &str,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError> {
        self.calls
            .lock()
            .unwrap()
            .push((function_id.to_owned(), context.clone()));
        let mut data = Map::new();
        data.insert("function".to_owned(), Value::from(function_id));
        Ok(data)
    }
}

/// A dispatcher that fails for the listed function ids and succeeds for all
/// others.
#[derive(Debug)]
pub struct FailingDispatcher {
    failing: Vec<String>,
}

impl FailingDispatcher {
    /// Fails every call.
    #[must_use]
    pub fn always() -> Self {
        Self { failing: Vec::new() }
    }

    /// Fails only calls to the given function ids.
    #[must_use]
    pub fn for_functions(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl FunctionDispatcher for FailingDispatcher {
    fn dispatch(
        &self,
        function_id: &str,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError> {
        if self.failing.is_empty() || self.failing.iter().any(|f| f == function_id) {
            return Err(DomainError::EffectFault(format!("{function_id} exploded")));
        }
        Ok(Map::new())
    }
}

/// A dispatcher that panics for one function id and succeeds otherwise.
#[derive(Debug)]
pub struct PanickingDispatcher {
    /// Function id that panics.
    pub panics_on: String,
}

impl FunctionDispatcher for PanickingDispatcher {
    fn dispatch(
        &self,
        function_id: &str,
        _context: &ExecutionContext,
    ) -> Result<Map<String, Value>, DomainError> {
        assert!(function_id != self.panics_on, "dispatcher blew up on {function_id}");
        Ok(Map::new())
    }
}

/// A messenger that records every delivered message.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ActorId, String)>>,
}

impl RecordingMessenger {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all delivered messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<(ActorId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ActorMessenger for RecordingMessenger {
    fn send_message(&self, actor: &ActorId, message: &str) {
        self.sent.lock().unwrap().push((*actor, message.to_owned()));
    }
}
