//! Worker pool for asynchronous effects and the queue that carries their
//! outcomes back to the primary thread.
//!
//! Workers only run the dispatcher. Anything that touches actors (message
//! delivery) happens when the owner of the [`CompletionQueue`] applies the
//! completions.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use delve_core::error::DomainError;
use delve_core::execution::{ActorMessenger, FunctionDispatcher};
use delve_core::ids::{ActorId, TriggerId};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::effect::{EffectJob, EffectScheduler, Ticket, into_fault, panic_message};

/// Outcome of one asynchronous effect.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub trigger_id: TriggerId,
    pub function: String,
    pub actor: Option<ActorId>,
    pub outcome: Result<Map<String, Value>, DomainError>,
}

impl Completion {
    /// Text to deliver to the actor: the `message` string in the effect
    /// output, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.outcome
            .as_ref()
            .ok()
            .and_then(|data| data.get("message"))
            .and_then(Value::as_str)
    }
}

/// Runs effects with `spawn_blocking` on a tokio runtime.
pub struct WorkerPool {
    runtime: Handle,
    dispatcher: Arc<dyn FunctionDispatcher>,
    next_ticket: AtomicU64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("next_ticket", &self.next_ticket)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Creates a pool on `runtime` and the queue its completions land on.
    #[must_use]
    pub fn new(runtime: Handle, dispatcher: Arc<dyn FunctionDispatcher>) -> (Self, CompletionQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = Self {
            runtime,
            dispatcher,
            next_ticket: AtomicU64::new(1),
            completions: tx,
        };
        (pool, CompletionQueue { rx })
    }
}

impl EffectScheduler for WorkerPool {
    fn schedule(&self, job: EffectJob) -> Result<Ticket, DomainError> {
        if self.completions.is_closed() {
            return Err(DomainError::Infrastructure(
                "completion queue has been dropped".to_owned(),
            ));
        }
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let dispatcher = Arc::clone(&self.dispatcher);
        let completions = self.completions.clone();
        debug!(%ticket, trigger_id = %job.trigger_id, function = %job.function, "scheduling async effect");

        self.runtime.spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                dispatcher.dispatch(&job.function, &job.context)
            }))
            .unwrap_or_else(|payload| {
                Err(DomainError::EffectFault(format!(
                    "function {} panicked: {}",
                    job.function,
                    panic_message(payload.as_ref())
                )))
            })
            .map_err(|err| into_fault(&job.function, err));

            let completion = Completion {
                ticket,
                trigger_id: job.trigger_id,
                function: job.function,
                actor: job.actor,
                outcome,
            };
            if completions.send(completion).is_err() {
                debug!(%ticket, "completion queue closed before effect finished");
            }
        });
        Ok(ticket)
    }
}

/// Receiving end of the worker pool. Owned by the primary thread.
#[derive(Debug)]
pub struct CompletionQueue {
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl CompletionQueue {
    /// Takes every completion that has arrived, without waiting.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            completions.push(completion);
        }
        completions
    }

    /// Waits for the next completion. `None` once every pool is gone.
    pub async fn next(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }
}

/// Delivers one completion's outcome on the calling thread.
pub fn apply(completion: &Completion, messenger: &dyn ActorMessenger) {
    match &completion.outcome {
        Ok(_) => {
            if let (Some(actor), Some(message)) = (&completion.actor, completion.message()) {
                messenger.send_message(actor, message);
            }
            info!(
                ticket = %completion.ticket,
                trigger_id = %completion.trigger_id,
                "async effect completed"
            );
        }
        Err(err) => warn!(
            ticket = %completion.ticket,
            trigger_id = %completion.trigger_id,
            error = %err,
            "async effect failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use delve_core::execution::ExecutionContext;
    use delve_test_support::{FailingDispatcher, PanickingDispatcher, RecordingMessenger};

    use super::*;

    /// Answers every call with a fixed message.
    struct GreetingDispatcher;

    impl FunctionDispatcher for GreetingDispatcher {
        fn dispatch(
            &self,
            function_id: &str,
            _context: &ExecutionContext,
        ) -> Result<Map<String, Value>, DomainError> {
            let mut data = Map::new();
            data.insert("message".to_owned(), Value::from(format!("{function_id} done")));
            Ok(data)
        }
    }

    fn job(function: &str, actor: Option<ActorId>) -> EffectJob {
        EffectJob {
            trigger_id: TriggerId::new("t1"),
            function: function.to_owned(),
            actor,
            context: ExecutionContext::new(),
        }
    }

    async fn wait_for(queue: &mut CompletionQueue) -> Completion {
        tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_completion_message_is_delivered_on_apply() {
        // Arrange
        let (pool, mut queue) = WorkerPool::new(Handle::current(), Arc::new(GreetingDispatcher));
        let messenger = RecordingMessenger::new();
        let actor = ActorId::random();

        // Act
        let ticket = pool.schedule(job("open_vault", Some(actor))).unwrap();
        let completion = wait_for(&mut queue).await;
        apply(&completion, &messenger);

        // Assert
        assert_eq!(completion.ticket, ticket);
        assert_eq!(messenger.sent(), vec![(actor, "open_vault done".to_owned())]);
    }

    #[tokio::test]
    async fn test_tickets_are_distinct() {
        let (pool, mut queue) = WorkerPool::new(Handle::current(), Arc::new(GreetingDispatcher));

        let first = pool.schedule(job("a", None)).unwrap();
        let second = pool.schedule(job("b", None)).unwrap();
        wait_for(&mut queue).await;
        wait_for(&mut queue).await;

        assert_ne!(first, second);
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn test_failed_effect_sends_nothing() {
        let (pool, mut queue) = WorkerPool::new(Handle::current(), Arc::new(FailingDispatcher::always()));
        let messenger = RecordingMessenger::new();

        pool.schedule(job("collapse", Some(ActorId::random()))).unwrap();
        let completion = wait_for(&mut queue).await;
        apply(&completion, &messenger);

        assert_eq!(
            completion.outcome.unwrap_err(),
            DomainError::EffectFault("collapse exploded".into())
        );
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_effect_becomes_fault() {
        let dispatcher = PanickingDispatcher {
            panics_on: "boom".to_owned(),
        };
        let (pool, mut queue) = WorkerPool::new(Handle::current(), Arc::new(dispatcher));

        pool.schedule(job("boom", None)).unwrap();
        let completion = wait_for(&mut queue).await;

        assert!(matches!(completion.outcome, Err(DomainError::EffectFault(_))));
    }

    #[tokio::test]
    async fn test_schedule_fails_once_queue_is_dropped() {
        let (pool, queue) = WorkerPool::new(Handle::current(), Arc::new(GreetingDispatcher));
        drop(queue);

        let result = pool.schedule(job("a", None));

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
