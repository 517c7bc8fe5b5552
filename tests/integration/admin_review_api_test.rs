// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{complete_analysis, extraction, spawn_app, submit_source};
use axum::http::StatusCode;
use harvestrs::engines::traits::{ExtractionError, ExtractionResponse};
use serde_json::{json, Value};

#[tokio::test]
async fn test_crawl_approve_publishes_activity() {
    let app = spawn_app(None);

    let crawl = app
        .server
        .post("/v1/admin/crawls")
        .json(&json!({
            "url": "https://library.example/story-time",
            "extracted_by_user": "admin@example.org"
        }))
        .await;
    crawl.assert_status(StatusCode::CREATED);
    let body: Value = crawl.json();
    assert_eq!(body["data"]["events_count"], 1);
    assert_eq!(body["data"]["credits_used"], 5);
    let event_id = body["data"]["event_id"].as_str().unwrap().to_string();

    // 审核前没有已发布的活动
    let before: Value = app.server.get("/v1/activities").await.json();
    assert_eq!(before["meta"]["total"], 0);

    let pending: Value = app.server.get("/v1/admin/events").await.json();
    assert_eq!(pending["data"].as_array().unwrap().len(), 1);

    let approve = app
        .server
        .post(&format!("/v1/admin/events/{}/approve", event_id))
        .json(&json!({ "reviewer": "admin@example.org" }))
        .await;
    approve.assert_status_ok();
    let approval: Value = approve.json();
    assert_eq!(approval["data"]["event"]["status"], "approved");
    assert_eq!(approval["data"]["activity"]["title"], "Toddler Story Time");

    let listed = app
        .server
        .get("/v1/activities")
        .add_query_param("category", "Reading")
        .await;
    listed.assert_status_ok();
    let page: Value = listed.json();
    assert_eq!(page["meta"]["total"], 1);
    assert_eq!(page["meta"]["count"], 1);
    assert_eq!(page["activities"][0]["title"], "Toddler Story Time");

    // 已批准的事件不能再次批准
    app.server
        .post(&format!("/v1/admin/events/{}/approve", event_id))
        .json(&json!({ "reviewer": "admin@example.org" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_crawl_of_registered_source_url_skips_extraction() {
    let app = spawn_app(None);
    submit_source(&app, "City Museum", "https://museum.example").await;

    let response = app
        .server
        .post("/v1/admin/crawls")
        .json(&json!({
            "url": "https://museum.example/",
            "extracted_by_user": "admin"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(app.client.calls(), 0);
}

#[tokio::test]
async fn test_repeated_crawl_of_pending_url_conflicts() {
    let app = spawn_app(None);
    let payload = json!({
        "url": "https://library.example/lego-club",
        "extracted_by_user": "admin"
    });

    app.server
        .post("/v1/admin/crawls")
        .json(&payload)
        .await
        .assert_status(StatusCode::CREATED);
    app.server
        .post("/v1/admin/crawls")
        .json(&payload)
        .await
        .assert_status(StatusCode::CONFLICT);
    assert_eq!(app.client.calls(), 1);
}

#[tokio::test]
async fn test_rejected_event_can_be_crawled_again() {
    let app = spawn_app(None);
    let payload = json!({
        "url": "https://library.example/lego-club",
        "extracted_by_user": "admin"
    });

    let first: Value = app.server.post("/v1/admin/crawls").json(&payload).await.json();
    let event_id = first["data"]["event_id"].as_str().unwrap().to_string();

    app.server
        .post(&format!("/v1/admin/events/{}/reject", event_id))
        .json(&json!({ "reviewer": "admin", "reason": "duplicate listing" }))
        .await
        .assert_status_ok();

    app.server
        .post("/v1/admin/crawls")
        .json(&payload)
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_edit_fixes_event_that_cannot_convert() {
    let app = spawn_app(None);
    app.client.respond(
        "https://library.example/untitled",
        Ok(extraction(json!({ "location": "Main Library" }))),
    );

    let crawl: Value = app
        .server
        .post("/v1/admin/crawls")
        .json(&json!({
            "url": "https://library.example/untitled",
            "extracted_by_user": "admin"
        }))
        .await
        .json();
    let event_id = crawl["data"]["event_id"].as_str().unwrap().to_string();
    assert!(crawl["data"]["conversion_issues"]
        .as_array()
        .unwrap()
        .iter()
        .any(|issue| issue == "missing title"));

    app.server
        .post(&format!("/v1/admin/events/{}/approve", event_id))
        .json(&json!({ "reviewer": "admin" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .post(&format!("/v1/admin/events/{}/edit", event_id))
        .json(&json!({
            "reviewer": "admin",
            "raw_data": {
                "title": "Puppet Show",
                "location": "Main Library",
                "start_date": "2025-07-04",
                "category": "theater"
            }
        }))
        .await
        .assert_status_ok();

    app.server
        .post(&format!("/v1/admin/events/{}/approve", event_id))
        .json(&json!({ "reviewer": "admin" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_approve_reports_conversion_warnings() {
    let app = spawn_app(None);
    app.client.respond(
        "https://library.example/lego-club",
        Ok(extraction(json!({ "title": "Lego Club", "date": "June 3, 2025" }))),
    );

    let crawl: Value = app
        .server
        .post("/v1/admin/crawls")
        .json(&json!({
            "url": "https://library.example/lego-club",
            "extracted_by_user": "admin"
        }))
        .await
        .json();
    let event_id = crawl["data"]["event_id"].as_str().unwrap().to_string();

    let approve = app
        .server
        .post(&format!("/v1/admin/events/{}/approve", event_id))
        .json(&json!({ "reviewer": "admin" }))
        .await;
    approve.assert_status_ok();
    let body: Value = approve.json();
    assert_eq!(body["data"]["activity"]["title"], "Lego Club");
    assert!(body["data"]["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w == "missing location"));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("activity published with"));
}

#[tokio::test]
async fn test_unsuccessful_extraction_leaves_no_event_behind() {
    let app = spawn_app(None);
    app.client.respond(
        "https://library.example/broken",
        Ok(ExtractionResponse {
            success: false,
            error: Some("extractor blew up".into()),
            ..Default::default()
        }),
    );
    let payload = json!({
        "url": "https://library.example/broken",
        "extracted_by_user": "admin"
    });

    let body: Value = app.server.post("/v1/admin/crawls").json(&payload).await.json();
    assert_eq!(body["error"]["kind"], "terminal_extraction");

    let pending: Value = app.server.get("/v1/admin/events").await.json();
    assert!(pending["data"].as_array().unwrap().is_empty());
    let sources: Value = app.server.get("/v1/sources").await.json();
    assert!(sources["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_terminal_extraction_failure_maps_to_unprocessable() {
    let app = spawn_app(None);
    app.client.respond(
        "https://gone.example/events",
        Err(ExtractionError::Dns("gone.example".into())),
    );

    let response = app
        .server
        .post("/v1/admin/crawls")
        .json(&json!({
            "url": "https://gone.example/events",
            "extracted_by_user": "admin"
        }))
        .await;

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "terminal_extraction");
}

#[tokio::test]
async fn test_batch_run_hands_new_records_to_review() {
    let app = spawn_app(None);
    let id = submit_source(&app, "Riverside Library", "https://library.example").await;
    complete_analysis(&app, id, "https://library.example/events").await;
    app.server
        .post(&format!("/v1/sources/{}/activate", id))
        .json(&json!({}))
        .await
        .assert_status_ok();

    let response = app.server.post("/v1/batches/run").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["tasks_started"], 1);
    assert_eq!(body["data"]["tasks_completed"], 1);
    assert_eq!(body["data"]["events_created"], 1);

    let pending: Value = app.server.get("/v1/admin/events").await.json();
    let events = pending["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["source_id"], id.to_string());

    // 没有到期任务时再次运行是空操作
    let again: Value = app.server.post("/v1/batches/run").await.json();
    assert_eq!(again["data"]["tasks_started"], 0);
}
