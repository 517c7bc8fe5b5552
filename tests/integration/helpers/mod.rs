// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use axum_test::TestServer;
use harvestrs::application::state::AppState;
use harvestrs::config::settings::Settings;
use harvestrs::domain::models::source::SourceAnalysis;
use harvestrs::domain::repositories::store::PartitionStore;
use harvestrs::engines::traits::{
    ExtractionClient, ExtractionError, ExtractionRequest, ExtractionResponse,
};
use harvestrs::infrastructure::store::MemoryPartitionStore;
use harvestrs::presentation::routes;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// 按URL返回预设结果的提取客户端，未登记的URL返回一条活动
#[derive(Default)]
pub struct StubClient {
    responses: Mutex<HashMap<String, Result<ExtractionResponse, ExtractionError>>>,
    calls: AtomicUsize,
}

impl StubClient {
    pub fn respond(&self, url: &str, response: Result<ExtractionResponse, ExtractionError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for StubClient {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.responses.lock().unwrap().get(&request.url).cloned();
        scripted.unwrap_or_else(|| Ok(extraction(default_activity())))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn default_activity() -> Value {
    json!({
        "title": "Toddler Story Time",
        "location": "Main Library",
        "start_date": "2025-06-01",
        "category": "reading",
        "image_url": "https://library.example/story.png"
    })
}

pub fn extraction(raw: Value) -> ExtractionResponse {
    ExtractionResponse {
        success: true,
        raw_structured_data: raw,
        events_count: 1,
        credits_used: 5,
        tokens_used: 120,
        processing_time_ms: 800,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub client: Arc<StubClient>,
    pub analysis_signals: mpsc::Receiver<Uuid>,
}

/// 使用内存存储搭建完整的应用
pub fn spawn_app(admin_api_key: Option<&str>) -> TestApp {
    let mut settings = Settings::default();
    settings.server.admin_api_key = admin_api_key.map(str::to_string);
    settings.engine.min_content_length = 10;
    settings.engine.backoff_unit_ms = 1;
    settings.engine.max_backoff_ms = 5;
    settings.scheduler.initial_delay_secs = 0;

    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitionStore::new());
    let client = Arc::new(StubClient::default());
    let (state, analysis_signals) =
        AppState::build(Arc::new(settings), store, client.clone());
    let server = TestServer::new(routes::routes(state.clone())).unwrap();

    TestApp {
        server,
        state,
        client,
        analysis_signals,
    }
}

/// 提交数据源，返回其ID
pub async fn submit_source(app: &TestApp, name: &str, base_url: &str) -> Uuid {
    let response = app
        .server
        .post("/v1/sources")
        .json(&json!({
            "source_name": name,
            "base_url": base_url,
            "source_type": "event_calendar",
            "priority": "high",
            "expected_content": ["events"],
            "hint_urls": [format!("{}/events", base_url)],
            "submitted_by": "founder@example.org"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["source_id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .unwrap()
}

/// 跳过分析工作器，直接记录一次成功的分析
pub async fn complete_analysis(app: &TestApp, source_id: Uuid, target_url: &str) {
    app.state.registry.begin_analysis(source_id).await.unwrap();
    app.state
        .registry
        .record_analysis(SourceAnalysis {
            source_id,
            selectors: BTreeMap::new(),
            target_urls: vec![target_url.to_string()],
            quality_score: 0.8,
            recommended_frequency_hours: 24,
            sampled_urls: 1,
            activities_sampled: 1,
            issues: vec![],
            error: None,
            analyzed_at: Utc::now(),
        })
        .await
        .unwrap();
}
