//! Shared application state.

use std::fmt;
use std::sync::Arc;

use delve_core::generation::GenerationService;
use delve_instances::domain::registry::InstanceRegistry;
use delve_triggers::application::manager::TriggerManager;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live dungeon instances.
    pub registry: Arc<InstanceRegistry>,
    /// Registered triggers and event dispatch.
    pub triggers: Arc<TriggerManager>,
    /// Layout generator used when creating instances.
    pub generator: Arc<dyn GenerationService>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        registry: Arc<InstanceRegistry>,
        triggers: Arc<TriggerManager>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            registry,
            triggers,
            generator,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}
