// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use harvestrs::application::state::AppState;
use harvestrs::config::settings::Settings;
use harvestrs::domain::models::source::{SourceSubmission, SourceType};
use harvestrs::domain::models::task::Priority;
use harvestrs::domain::repositories::activity_repository::{ActivityQuery, ActivityRepository};
use harvestrs::domain::services::review_service::CrawlSubmission;
use harvestrs::engines::traits::{
    ExtractionClient, ExtractionError, ExtractionRequest, ExtractionResponse,
};
use harvestrs::infrastructure::store::MemoryPartitionStore;
use harvestrs::utils::errors::ServiceError;
use mockall::mock;
use serde_json::json;
use std::sync::Arc;

mock! {
    pub Extractor {}
    #[async_trait]
    impl ExtractionClient for Extractor {
        async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResponse, ExtractionError>;
        fn name(&self) -> &'static str;
    }
}

fn state_with(client: MockExtractor) -> Arc<AppState> {
    let mut settings = Settings::default();
    settings.engine.min_content_length = 10;
    let (state, _signals) = AppState::build(
        Arc::new(settings),
        Arc::new(MemoryPartitionStore::new()),
        Arc::new(client),
    );
    state
}

fn crawl(url: &str) -> CrawlSubmission {
    CrawlSubmission {
        url: url.to_string(),
        schema_type: "event".to_string(),
        custom_schema: None,
        extracted_by: "admin".to_string(),
        admin_notes: None,
    }
}

#[tokio::test]
async fn test_crawl_of_source_url_never_calls_extraction() {
    // Given: 提取客户端不应被调用
    let mut client = MockExtractor::new();
    client.expect_extract().times(0);
    client.expect_name().return_const("mock");
    let state = state_with(client);

    state
        .registry
        .submit(SourceSubmission {
            name: "City Museum".into(),
            base_url: "https://museum.example".into(),
            source_type: SourceType::Venue,
            priority: Priority::Medium,
            expected_content: vec![],
            hint_urls: vec![],
            submitted_by: "founder".into(),
        })
        .await
        .unwrap();

    // When: 管理员抓取同一个URL
    let result = state.review.submit_crawl(crawl("https://museum.example")).await;

    // Then: 冲突
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_crawl_sends_schema_and_stores_pending_event() {
    let mut client = MockExtractor::new();
    client
        .expect_extract()
        .withf(|request| {
            request.url == "https://park.example/summer-camp" && request.schema.name() == "camp"
        })
        .times(1)
        .returning(|_| {
            Ok(ExtractionResponse {
                success: true,
                raw_structured_data: json!({
                    "name": "Nature Camp",
                    "location": "Lakeside Park",
                    "start_date": "2025-07-07",
                    "ages": "6-10"
                }),
                events_count: 1,
                credits_used: 2,
                ..Default::default()
            })
        });
    client.expect_name().return_const("mock");
    let state = state_with(client);

    let mut submission = crawl("https://park.example/summer-camp");
    submission.schema_type = "camp".to_string();
    let reviewed = state.review.submit_crawl(submission).await.unwrap();

    assert_eq!(reviewed.event.events_count, 1);
    assert_eq!(reviewed.event.credits_used, 2);
    assert!(reviewed.event.source_id.is_some());

    // 抓取不会直接发布活动
    let page = state
        .activities
        .list(&ActivityQuery {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_retryable_failure_surfaces_as_transient() {
    let mut client = MockExtractor::new();
    client
        .expect_extract()
        .times(1)
        .returning(|_| Err(ExtractionError::Upstream {
            status: 503,
            message: "busy".into(),
        }));
    client.expect_name().return_const("mock");
    let state = state_with(client);

    let result = state
        .review
        .submit_crawl(crawl("https://library.example/events"))
        .await;

    assert!(matches!(result, Err(ServiceError::TransientExtraction(_))));
    assert!(state
        .review
        .list_events(Default::default(), 10)
        .await
        .unwrap()
        .is_empty());
}
