//! Integration tests for the trigger routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;

fn tick_definition(id: &str) -> serde_json::Value {
    json!({ "id": id, "type": "TIME_INTERVAL", "function": "drip", "cooldown-seconds": 10 })
}

#[tokio::test]
async fn test_register_trigger_returns_201_with_view() {
    // Arrange
    let app = common::build_test_app();
    let body = json!({
        "id": "vault-lever",
        "type": "PLAYER_INTERACT",
        "location": common::overworld(1.0, 64.0, 0.0),
        "function": "open_vault",
        "target-materials": ["LEVER"],
        "required-items": ["TRIPWIRE_HOOK"],
    });

    // Act
    let (status, json) = common::post_json(app, "/api/v1/triggers", &body).await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["trigger_id"], "vault-lever");
    assert_eq!(json["trigger_type"], "PLAYER_INTERACT");
    assert_eq!(json["enabled"], true);
    assert_eq!(json["active"], true);
    assert_eq!(json["fire_count"], 0);
    assert_eq!(json["radius"], 3.0);
    assert!(json["instance"].is_null());
}

#[tokio::test]
async fn test_register_duplicate_trigger_returns_409() {
    // Arrange
    let harness = common::build_harness();
    common::post_json(harness.app.clone(), "/api/v1/triggers", &tick_definition("drip")).await;

    // Act
    let (status, json) =
        common::post_json(harness.app.clone(), "/api/v1/triggers", &tick_definition("drip")).await;

    // Assert
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "already_exists");
    assert_eq!(harness.triggers.trigger_count(), 1);
}

#[tokio::test]
async fn test_register_trigger_with_negative_radius_returns_400() {
    let app = common::build_test_app();
    let body = json!({ "id": "bad", "type": "PLAYER_MOVE", "radius": -1.0 });

    let (status, json) = common::post_json(app, "/api/v1/triggers", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_argument");
}

#[tokio::test]
async fn test_register_async_trigger_without_function_returns_400() {
    let app = common::build_test_app();
    let body = json!({ "id": "bad", "type": "TIME_INTERVAL", "async": true });

    let (status, _) = common::post_json(app, "/api/v1/triggers", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_triggers_keeps_registration_order() {
    // Arrange
    let app = common::build_test_app();
    for id in ["c", "a", "b"] {
        common::post_json(app.clone(), "/api/v1/triggers", &tick_definition(id)).await;
    }

    // Act
    let (status, json) = common::get_json(app, "/api/v1/triggers").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["trigger_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_get_unknown_trigger_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app, "/api/v1/triggers/ghost").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_disable_and_enable_trigger() {
    // Arrange
    let app = common::build_test_app();
    common::post_json(app.clone(), "/api/v1/triggers", &tick_definition("drip")).await;

    // Act
    let (disable_status, disabled) =
        common::post_empty(app.clone(), "/api/v1/triggers/drip/disable").await;
    let (_, tick) = common::post_json(app.clone(), "/api/v1/events", &json!({ "event": { "type": "tick" } })).await;
    let (enable_status, enabled) =
        common::post_empty(app.clone(), "/api/v1/triggers/drip/enable").await;

    // Assert
    assert_eq!(disable_status, StatusCode::OK);
    assert_eq!(disabled["enabled"], false);
    assert_eq!(tick["results"], json!([]));
    assert_eq!(enable_status, StatusCode::OK);
    assert_eq!(enabled["enabled"], true);
}

#[tokio::test]
async fn test_switching_unknown_trigger_returns_404() {
    let app = common::build_test_app();

    let (status, _) = common::post_empty(app, "/api/v1/triggers/ghost/enable").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_cooldown_lets_trigger_fire_again() {
    // Arrange
    let app = common::build_test_app();
    let tick = json!({ "event": { "type": "tick" } });
    common::post_json(app.clone(), "/api/v1/triggers", &tick_definition("drip")).await;
    let (_, first) = common::post_json(app.clone(), "/api/v1/events", &tick).await;
    let (_, cooling) = common::get_json(app.clone(), "/api/v1/triggers/drip").await;

    // Act
    let (status, reset) = common::post_empty(app.clone(), "/api/v1/triggers/drip/reset-cooldown").await;
    let (_, second) = common::post_json(app, "/api/v1/events", &tick).await;

    // Assert
    assert_eq!(first["results"].as_array().unwrap().len(), 1);
    assert_eq!(cooling["cooldown_remaining_ms"], 10_000);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["cooldown_remaining_ms"], 0);
    assert_eq!(second["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unregister_trigger_returns_204_then_404() {
    // Arrange
    let harness = common::build_harness();
    common::post_json(harness.app.clone(), "/api/v1/triggers", &tick_definition("drip")).await;

    // Act
    let (status, body) = common::delete(harness.app.clone(), "/api/v1/triggers/drip").await;
    let (again, _) = common::delete(harness.app.clone(), "/api/v1/triggers/drip").await;

    // Assert
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());
    assert_eq!(again, StatusCode::NOT_FOUND);
    assert_eq!(harness.triggers.trigger_count(), 0);
}
