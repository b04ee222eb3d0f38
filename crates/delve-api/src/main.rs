//! Delve API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use delve_api::cleanup::spawn_idle_cleanup;
use delve_api::config::Config;
use delve_api::host::{LoggingDispatcher, LoggingMessenger};
use delve_api::state::AppState;
use delve_core::clock::{Clock, SystemClock};
use delve_core::execution::{ActorMessenger, FunctionDispatcher};
use delve_core::generation::BoxLayoutGenerator;
use delve_core::rng::SystemRng;
use delve_instances::domain::registry::InstanceRegistry;
use delve_triggers::application::manager::TriggerManager;
use delve_triggers::application::worker::{self, WorkerPool};
use delve_triggers::domain::definition::load_definitions;
use tokio::runtime::Handle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Delve API server");

    let config = Config::from_env()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(InstanceRegistry::new(
        config.registry,
        Arc::clone(&clock),
        Box::new(SystemRng::new()),
    ));

    // Async effects run on the blocking pool; their completions are applied
    // by a single task.
    let dispatcher: Arc<dyn FunctionDispatcher> = Arc::new(LoggingDispatcher);
    let messenger: Arc<dyn ActorMessenger> = Arc::new(LoggingMessenger);
    let (pool, mut completions) = WorkerPool::new(Handle::current(), Arc::clone(&dispatcher));
    let triggers = Arc::new(
        TriggerManager::new(clock, dispatcher, Arc::clone(&messenger))
            .with_scheduler(Arc::new(pool)),
    );
    tokio::spawn(async move {
        while let Some(completion) = completions.next().await {
            worker::apply(&completion, messenger.as_ref());
        }
    });

    if let Some(path) = &config.triggers_file {
        let yaml = tokio::fs::read_to_string(path).await?;
        let registered = triggers.register_definitions(load_definitions(&yaml)?);
        tracing::info!(path = %path.display(), registered, "trigger file loaded");
    }

    let generator = Arc::new(BoxLayoutGenerator {
        half_width: config.registry.half_width,
        depth: config.registry.depth,
        height: config.registry.height,
    });
    let app_state = AppState::new(Arc::clone(&registry), triggers, generator);
    let cleanup = spawn_idle_cleanup(&app_state, config.cleanup_interval, config.idle_timeout);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = delve_api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    let destroyed = registry.shutdown();
    tracing::info!(destroyed, "Delve API server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
