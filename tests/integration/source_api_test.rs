// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{complete_analysis, spawn_app, submit_source};
use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_and_version_are_public() {
    let app = spawn_app(Some("secret"));

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    health.assert_text("OK");

    let version = app.server.get("/v1/version").await;
    version.assert_status_ok();
    version.assert_text(env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_submit_source_starts_pending_analysis() {
    let mut app = spawn_app(None);

    let id = submit_source(&app, "Riverside Library", "https://library.example").await;

    // 提交后发出分析信号
    assert_eq!(app.analysis_signals.try_recv().unwrap(), id);

    let response = app.server.get(&format!("/v1/sources/{}", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["source"]["status"], "pending_analysis");
    assert_eq!(
        body["data"]["source"]["submission"]["base_url"],
        "https://library.example"
    );

    let listed: Value = app.server.get("/v1/sources").await.json();
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_submission_returns_validation_envelope() {
    let app = spawn_app(None);

    let response = app
        .server
        .post("/v1/sources")
        .json(&json!({
            "source_name": "",
            "base_url": "not a url",
            "source_type": "venue",
            "submitted_by": "founder"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn test_duplicate_base_url_conflicts() {
    let app = spawn_app(None);
    submit_source(&app, "Riverside Library", "https://library.example").await;

    let response = app
        .server
        .post("/v1/sources")
        .json(&json!({
            "source_name": "Riverside Library again",
            "base_url": "https://www.library.example/",
            "source_type": "venue",
            "submitted_by": "founder"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["kind"], "conflict");
}

#[tokio::test]
async fn test_unknown_source_is_not_found() {
    let app = spawn_app(None);

    let response = app
        .server
        .get(&format!("/v1/sources/{}", uuid::Uuid::new_v4()))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_activation_requires_completed_analysis() {
    let app = spawn_app(None);
    let id = submit_source(&app, "Riverside Library", "https://library.example").await;

    let early = app
        .server
        .post(&format!("/v1/sources/{}/activate", id))
        .json(&json!({}))
        .await;
    early.assert_status(StatusCode::CONFLICT);

    complete_analysis(&app, id, "https://library.example/events").await;
    let activated = app
        .server
        .post(&format!("/v1/sources/{}/activate", id))
        .json(&json!({ "admin_notes": "looks good" }))
        .await;
    activated.assert_status_ok();
    let body: Value = activated.json();
    assert_eq!(body["data"]["source"]["status"], "active");
    assert!(body["data"]["task_id"].is_string());

    // 再次激活被拒绝
    app.server
        .post(&format!("/v1/sources/{}/activate", id))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_manual_scrape_requires_active_source() {
    let app = spawn_app(None);
    let id = submit_source(&app, "Riverside Library", "https://library.example").await;

    app.server
        .post(&format!("/v1/sources/{}/scrape", id))
        .json(&json!({ "requested_by": "ops" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    complete_analysis(&app, id, "https://library.example/events").await;
    app.server
        .post(&format!("/v1/sources/{}/activate", id))
        .json(&json!({}))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/v1/sources/{}/scrape", id))
        .json(&json!({ "requested_by": "ops" }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["source_id"], id.to_string());
}

#[tokio::test]
async fn test_delete_requires_matching_name() {
    let app = spawn_app(None);
    let id = submit_source(&app, "Riverside Library", "https://library.example").await;

    app.server
        .delete(&format!("/v1/sources/{}", id))
        .json(&json!({ "confirm_name": "Other Library" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .delete(&format!("/v1/sources/{}", id))
        .json(&json!({ "confirm_name": "Riverside Library" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["data"]["records_removed"].as_u64().unwrap() >= 1);

    app.server
        .get(&format!("/v1/sources/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes_require_bearer_key_when_configured() {
    let app = spawn_app(Some("secret"));

    let missing = app.server.get("/v1/sources").await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = missing.json();
    assert_eq!(body["error"]["kind"], "unauthorized");

    app.server
        .get("/v1/sources")
        .authorization_bearer("wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .get("/v1/sources")
        .authorization_bearer("secret")
        .await
        .assert_status_ok();

    // 公开接口不受影响
    app.server.get("/v1/activities").await.assert_status_ok();
}
