//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use delve_core::clock::Clock;
use delve_core::execution::{ActorMessenger, FunctionDispatcher};
use delve_core::generation::GenerationService;
use delve_instances::domain::registry::{InstanceRegistry, RegistryConfig};
use delve_test_support::{
    FixedGenerator, ManualClock, RecordingDispatcher, RecordingMessenger, SequenceRng, fixed_now,
};
use delve_triggers::application::manager::TriggerManager;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use delve_api::state::AppState;

/// Everything a test may want to inspect behind the router.
pub struct TestHarness {
    pub app: Router,
    pub registry: Arc<InstanceRegistry>,
    pub triggers: Arc<TriggerManager>,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub messenger: Arc<RecordingMessenger>,
}

/// Build the full app with a recording dispatcher, a manual clock starting at
/// 2026-01-15 10:00 UTC, and a generator that carves a 20-block cube.
pub fn build_harness() -> TestHarness {
    build_harness_with(RegistryConfig::default(), Arc::new(FixedGenerator { half_width: 20.0 }))
}

/// Like [`build_harness`] with a custom registry configuration and generator.
pub fn build_harness_with(
    config: RegistryConfig,
    generator: Arc<dyn GenerationService>,
) -> TestHarness {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    build_harness_full(config, generator, dispatcher.clone(), dispatcher)
}

/// Like [`build_harness_with`] with the dispatcher triggers actually run.
/// `recorder` is only exposed on the harness.
pub fn build_harness_full(
    config: RegistryConfig,
    generator: Arc<dyn GenerationService>,
    dispatcher: Arc<dyn FunctionDispatcher>,
    recorder: Arc<RecordingDispatcher>,
) -> TestHarness {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let messenger = Arc::new(RecordingMessenger::new());
    let shared_messenger: Arc<dyn ActorMessenger> = messenger.clone();

    let registry = Arc::new(InstanceRegistry::new(
        config,
        Arc::clone(&shared_clock),
        Box::new(SequenceRng::new((1..=256).collect())),
    ));
    let triggers = Arc::new(TriggerManager::new(
        shared_clock,
        dispatcher,
        shared_messenger,
    ));
    let app_state = AppState::new(Arc::clone(&registry), Arc::clone(&triggers), generator);

    TestHarness {
        app: delve_api::app(app_state),
        registry,
        triggers,
        clock,
        dispatcher: recorder,
        messenger,
    }
}

/// Build the full app router with default test collaborators.
pub fn build_test_app() -> Router {
    build_harness().app
}

/// `{world, x, y, z}` in the overworld.
pub fn overworld(x: f64, y: f64, z: f64) -> Value {
    json!({ "world": "overworld", "x": x, "y": y, "z": z })
}

/// Creates a dungeon through the API and returns its id.
pub async fn create_dungeon(app: &Router, template_id: &str, location: Value) -> String {
    let (status, json) = post_json(
        app.clone(),
        "/api/v1/dungeons",
        &json!({ "template_id": template_id, "location": location, "created_by": "P1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["instance_id"].as_str().unwrap().to_owned()
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, "POST", uri, None).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

/// Send a DELETE request and return the response (`Null` for empty bodies).
pub async fn delete(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, "DELETE", uri, None).await
}
