// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::config::settings::{SchedulerSettings, Settings};
use crate::domain::models::admin_event::{AdminEventStatus, EventOrigin};
use crate::domain::models::execution::ExecutionOutcome;
use crate::domain::models::source::{SourceAnalysis, SourceSubmission, SourceType};
use crate::domain::models::task::{Priority, TaskStatus, TaskType};
use crate::domain::repositories::admin_event_repository::AdminEventRepository;
use crate::domain::repositories::store::PartitionStore;
use crate::domain::services::conversion_service::SchemaConverter;
use crate::domain::services::quality_scorer::QualityScorer;
use crate::domain::services::source_analyzer::AnalysisQueue;
use crate::engines::error_policy::{ErrorPolicy, ErrorPolicyTable};
use crate::engines::traits::{
    ClientProfile, ExtractionClient, ExtractionError, ExtractionRequest, ExtractionResponse,
};
use crate::infrastructure::repositories::activity_repo_impl::ActivityRepositoryImpl;
use crate::infrastructure::repositories::admin_event_repo_impl::AdminEventRepositoryImpl;
use crate::infrastructure::repositories::execution_repo_impl::ExecutionRepositoryImpl;
use crate::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use crate::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use crate::infrastructure::store::MemoryPartitionStore;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// 总是返回同一结果的提取客户端
struct FixedClient(Result<ExtractionResponse, ExtractionError>);

#[async_trait]
impl ExtractionClient for FixedClient {
    async fn extract(
        &self,
        _request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        self.0.clone()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn two_events() -> ExtractionResponse {
    ExtractionResponse {
        success: true,
        raw_structured_data: json!({
            "events": [
                {"title": "Story Time", "location": "Main Library", "start_date": "2025-06-01"},
                {"title": "Lego Club", "location": "Main Library", "start_date": "2025-06-02"}
            ]
        }),
        events_count: 2,
        credits_used: 3,
        ..Default::default()
    }
}

struct Fixture {
    runner: TaskRunner,
    registry: Arc<SourceRegistry>,
    tasks: Arc<dyn TaskRepository>,
    executions: Arc<dyn ExecutionRepository>,
    events: Arc<dyn AdminEventRepository>,
}

fn fixture(response: Result<ExtractionResponse, ExtractionError>) -> Fixture {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitionStore::new());
    let tasks: Arc<dyn TaskRepository> = Arc::new(TaskRepositoryImpl::new(store.clone()));
    let executions: Arc<dyn ExecutionRepository> =
        Arc::new(ExecutionRepositoryImpl::new(store.clone()));
    let events: Arc<dyn AdminEventRepository> =
        Arc::new(AdminEventRepositoryImpl::new(store.clone()));
    let activities = Arc::new(ActivityRepositoryImpl::new(store.clone()));

    let scheduler = Arc::new(TaskScheduler::new(
        tasks.clone(),
        executions.clone(),
        SchedulerSettings::default(),
    ));
    let (queue, _signals) = AnalysisQueue::channel(16);
    let registry = Arc::new(SourceRegistry::new(
        Arc::new(SourceRepositoryImpl::new(store.clone())),
        scheduler.clone(),
        queue,
        Settings::default().source_defaults(),
    ));

    let client: Arc<dyn ExtractionClient> = Arc::new(FixedClient(response));
    let engine_settings = EngineSettings {
        min_content_length: 20,
        backoff_unit_ms: 1,
        max_backoff_ms: 5,
        ..Default::default()
    };
    let engine = Arc::new(ExecutionEngine::new(
        client.clone(),
        activities.clone(),
        ErrorPolicyTable::new(ErrorPolicy::default(), vec!["agent".into()]),
        QualityScorer::default(),
        engine_settings.clone(),
    ));
    let review = Arc::new(ReviewPipeline::new(
        events.clone(),
        activities,
        registry.clone(),
        client,
        Arc::new(SchemaConverter::new()),
        ClientProfile {
            user_agent: "agent".into(),
            timeout: StdDuration::from_secs(5),
        },
        engine_settings.min_content_length,
    ));
    let runner = TaskRunner::new(
        scheduler,
        tasks.clone(),
        executions.clone(),
        registry.clone(),
        engine,
        review,
        &engine_settings,
    );
    Fixture {
        runner,
        registry,
        tasks,
        executions,
        events,
    }
}

/// 提交、分析并激活一个数据源，返回其ID
async fn activated_source(registry: &SourceRegistry) -> Uuid {
    let source = registry
        .submit(SourceSubmission {
            name: "Riverside Library".into(),
            base_url: "https://library.example".into(),
            source_type: SourceType::EventCalendar,
            priority: Priority::Medium,
            expected_content: vec![],
            hint_urls: vec![],
            submitted_by: "founder".into(),
        })
        .await
        .unwrap();
    registry.begin_analysis(source.id).await.unwrap();
    registry
        .record_analysis(SourceAnalysis {
            source_id: source.id,
            selectors: BTreeMap::new(),
            target_urls: vec!["https://library.example/events".into()],
            quality_score: 0.7,
            recommended_frequency_hours: 24,
            sampled_urls: 1,
            activities_sampled: 2,
            issues: vec![],
            error: None,
            analyzed_at: Utc::now(),
        })
        .await
        .unwrap();
    registry.activate(source.id, None).await.unwrap();
    source.id
}

fn soon() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(1)
}

#[tokio::test]
async fn test_successful_run_hands_candidates_to_review_and_schedules_next() {
    let f = fixture(Ok(two_events()));
    let source_id = activated_source(&f.registry).await;

    let summary = f.runner.run_due(soon()).await.unwrap();

    assert_eq!(summary.tasks_started, 1);
    assert_eq!(summary.tasks_completed, 1);
    assert_eq!(summary.tasks_failed, 0);
    assert_eq!(summary.events_created, 2);
    assert_eq!(summary.batch.successful_sources, 1);

    let tasks = f.tasks.list_by_source(source_id).await.unwrap();
    let initial = tasks
        .iter()
        .find(|t| t.task_type == TaskType::FullScrape)
        .unwrap();
    assert_eq!(initial.status, TaskStatus::Completed);
    let next = tasks
        .iter()
        .find(|t| t.task_type == TaskType::Incremental)
        .unwrap();
    assert_eq!(next.status, TaskStatus::Scheduled);
    assert!(next.scheduled_time > Utc::now() + Duration::hours(1));

    let execution = f
        .executions
        .find_by_id(initial.execution_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.outcome, ExecutionOutcome::Succeeded);
    assert_eq!(execution.items_extracted, 2);
    assert_eq!(execution.items_stored, 2);
    assert!(execution.content_hash.is_some());

    let pending = f
        .events
        .list_by_status(AdminEventStatus::Pending, 10)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|e| e.origin == EventOrigin::Engine));
    assert!(pending.iter().all(|e| e.source_id == Some(source_id)));

    let config = f.registry.find_config(source_id).await.unwrap().unwrap();
    assert!(config.last_content_hash.is_some());
}

#[tokio::test]
async fn test_recurring_run_over_unchanged_content_adds_no_events() {
    let f = fixture(Ok(two_events()));
    activated_source(&f.registry).await;

    let first = f.runner.run_due(soon()).await.unwrap();
    assert_eq!(first.events_created, 2);

    // 下一次增量任务到期，内容没有变化
    let second = f
        .runner
        .run_due(Utc::now() + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(second.tasks_started, 1);
    assert_eq!(second.tasks_completed, 1);
    assert_eq!(second.events_created, 0);

    let pending = f
        .events
        .list_by_status(AdminEventStatus::Pending, 10)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_retryable_failure_reschedules_the_task() {
    let f = fixture(Err(ExtractionError::Tls("handshake reset".into())));
    let source_id = activated_source(&f.registry).await;

    let summary = f.runner.run_due(soon()).await.unwrap();

    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.retries_scheduled, 1);
    assert_eq!(summary.events_created, 0);

    let tasks = f.tasks.list_by_source(source_id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Scheduled);
    assert_eq!(tasks[0].retry_count, 1);
    assert!(tasks[0].last_error.as_deref().unwrap().contains("handshake"));
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let f = fixture(Err(ExtractionError::Dns("no such host".into())));
    let source_id = activated_source(&f.registry).await;

    let summary = f.runner.run_due(soon()).await.unwrap();

    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.retries_scheduled, 0);

    let tasks = f.tasks.list_by_source(source_id).await.unwrap();
    let initial = tasks
        .iter()
        .find(|t| t.task_type == TaskType::FullScrape)
        .unwrap();
    assert_eq!(initial.status, TaskStatus::Failed);
    assert_eq!(initial.retry_count, 0);
    assert!(tasks.iter().any(|t| t.task_type == TaskType::Incremental));
}

#[tokio::test]
async fn test_nothing_due_is_a_no_op() {
    let f = fixture(Ok(two_events()));
    activated_source(&f.registry).await;

    let summary = f.runner.run_due(Utc::now()).await.unwrap();

    assert_eq!(summary.tasks_started, 0);
    assert_eq!(summary.batch.sources_attempted, 0);
}
