//! Idle instance cleanup.
//!
//! A background loop periodically destroys instances that have been empty
//! for longer than the idle timeout and reports the destroyed ids to a
//! callback (the API uses it to unregister their triggers).

use std::sync::Arc;

use chrono::Duration;
use delve_core::ids::InstanceId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::registry::InstanceRegistry;

/// Runs one sweep and hands the destroyed ids to `on_destroyed` (only when
/// there are any).
pub fn run_cleanup_pass(
    registry: &InstanceRegistry,
    idle_timeout: Duration,
    on_destroyed: &(dyn Fn(&[InstanceId]) + Send + Sync),
) -> Vec<InstanceId> {
    let destroyed = registry.sweep_idle(idle_timeout);
    if destroyed.is_empty() {
        debug!("cleanup pass found no idle instances");
    } else {
        on_destroyed(&destroyed);
    }
    destroyed
}

/// Spawns the cleanup loop on the current tokio runtime. The first sweep
/// runs one `period` after spawning.
///
/// A zero `period` is raised to one millisecond.
pub fn spawn_cleanup_task<F>(
    registry: Arc<InstanceRegistry>,
    period: std::time::Duration,
    idle_timeout: Duration,
    on_destroyed: F,
) -> JoinHandle<()>
where
    F: Fn(&[InstanceId]) + Send + Sync + 'static,
{
    let period = period.max(std::time::Duration::from_millis(1));
    tokio::spawn(async move {
        info!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            idle_timeout_secs = idle_timeout.num_seconds(),
            "starting idle instance cleanup"
        );
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_cleanup_pass(&registry, idle_timeout, &on_destroyed);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use delve_core::geometry::{Location, WorldId};
    use delve_core::ids::ActorId;
    use delve_test_support::{ManualClock, SequenceRng, fixed_now};

    use super::*;
    use crate::domain::registry::RegistryConfig;

    fn setup() -> (Arc<ManualClock>, Arc<InstanceRegistry>) {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let registry = Arc::new(InstanceRegistry::new(
            RegistryConfig::default(),
            clock.clone(),
            Box::new(SequenceRng::new(vec![1, 2, 3])),
        ));
        (clock, registry)
    }

    fn at(x: f64) -> Location {
        Location::new(WorldId::new("overworld"), x, 64.0, 0.0)
    }

    #[test]
    fn test_cleanup_pass_reports_destroyed_ids() {
        // Arrange
        let (clock, registry) = setup();
        let idle = registry.create_dungeon("crypt", "bone", Some(&at(0.0)), "P1").unwrap();
        let busy = registry.create_dungeon("vault", "gold", Some(&at(1_000.0)), "P2").unwrap();
        registry.bind_actor(ActorId::random(), busy.id());
        clock.advance(Duration::seconds(301));
        let reported = Mutex::new(Vec::new());

        // Act
        let destroyed = run_cleanup_pass(&registry, Duration::seconds(300), &|ids| {
            reported.lock().unwrap().extend_from_slice(ids);
        });

        // Assert
        assert_eq!(destroyed, vec![idle.id().clone()]);
        assert_eq!(*reported.lock().unwrap(), destroyed);
        assert!(registry.get_instance(busy.id()).is_some());
    }

    #[test]
    fn test_cleanup_pass_skips_callback_when_nothing_idle() {
        let (_clock, registry) = setup();
        registry.create_dungeon("crypt", "bone", Some(&at(0.0)), "P1").unwrap();
        let called = Mutex::new(false);

        let destroyed = run_cleanup_pass(&registry, Duration::seconds(300), &|_| {
            *called.lock().unwrap() = true;
        });

        assert!(destroyed.is_empty());
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_spawned_task_sweeps_periodically() {
        // Arrange
        let (clock, registry) = setup();
        registry.create_dungeon("crypt", "bone", Some(&at(0.0)), "P1").unwrap();
        clock.advance(Duration::seconds(10));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        // Act
        let handle = spawn_cleanup_task(
            Arc::clone(&registry),
            std::time::Duration::from_millis(5),
            Duration::seconds(5),
            move |ids| {
                let _ = tx.send(ids.to_vec());
            },
        );
        let destroyed = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        handle.abort();

        // Assert
        assert_eq!(destroyed.len(), 1);
        assert_eq!(registry.instance_count(), 0);
    }
}
