//! Idle instance cleanup for the server.
//!
//! A swept instance loses its scoped triggers the same way a deleted one
//! does, so the trigger table never holds triggers for dead instances.

use std::sync::Arc;

use chrono::Duration;
use delve_core::ids::InstanceId;
use delve_instances::application::cleanup::{run_cleanup_pass, spawn_cleanup_task};
use delve_instances::domain::registry::InstanceRegistry;
use delve_triggers::application::manager::TriggerManager;
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::AppState;

/// Unregisters the triggers of instances the sweep destroyed. Returns how
/// many triggers were removed.
pub fn retire_instance_triggers(triggers: &TriggerManager, destroyed: &[InstanceId]) -> usize {
    let removed: usize = destroyed
        .iter()
        .map(|id| triggers.unregister_dungeon_triggers(id))
        .sum();
    info!(instances = destroyed.len(), triggers_removed = removed, "idle instances retired");
    removed
}

/// Runs one sweep and retires the destroyed instances' triggers.
pub fn sweep_idle_dungeons(
    registry: &InstanceRegistry,
    triggers: &TriggerManager,
    idle_timeout: Duration,
) -> Vec<InstanceId> {
    run_cleanup_pass(registry, idle_timeout, &|destroyed| {
        retire_instance_triggers(triggers, destroyed);
    })
}

/// Spawns the periodic sweep over `state`'s registry and trigger table.
pub fn spawn_idle_cleanup(
    state: &AppState,
    period: std::time::Duration,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    let triggers = Arc::clone(&state.triggers);
    spawn_cleanup_task(
        Arc::clone(&state.registry),
        period,
        idle_timeout,
        move |destroyed| {
            retire_instance_triggers(&triggers, destroyed);
        },
    )
}
