// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{ExtractionSettings, Settings};
use crate::domain::repositories::activity_repository::ActivityRepository;
use crate::domain::repositories::store::PartitionStore;
use crate::domain::services::conversion_service::SchemaConverter;
use crate::domain::services::quality_scorer::QualityScorer;
use crate::domain::services::review_service::ReviewPipeline;
use crate::domain::services::source_analyzer::{AnalysisQueue, SourceAnalyzer};
use crate::domain::services::source_registry::SourceRegistry;
use crate::engines::error_policy::ErrorPolicyTable;
use crate::engines::execution_engine::ExecutionEngine;
use crate::engines::task_runner::TaskRunner;
use crate::engines::traits::{ClientProfile, ExtractionClient};
use crate::infrastructure::repositories::activity_repo_impl::ActivityRepositoryImpl;
use crate::infrastructure::repositories::admin_event_repo_impl::AdminEventRepositoryImpl;
use crate::infrastructure::repositories::execution_repo_impl::ExecutionRepositoryImpl;
use crate::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use crate::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use crate::queue::scheduler::TaskScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 分析信号通道容量
const ANALYSIS_QUEUE_CAPACITY: usize = 256;

/// 应用共享状态
///
/// 所有组件共用同一个分区存储，通过 `Extension` 注入到处理器和工作器
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn PartitionStore>,
    pub activities: Arc<dyn ActivityRepository>,
    pub scheduler: Arc<TaskScheduler>,
    pub registry: Arc<SourceRegistry>,
    pub analyzer: Arc<SourceAnalyzer>,
    pub review: Arc<ReviewPipeline>,
    pub runner: Arc<TaskRunner>,
}

impl AppState {
    /// 组装所有组件
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    /// * `store` - 分区存储实现
    /// * `client` - 提取服务客户端
    ///
    /// # 返回值
    ///
    /// 共享状态以及分析信号的接收端，接收端交给分析工作器消费
    pub fn build(
        settings: Arc<Settings>,
        store: Arc<dyn PartitionStore>,
        client: Arc<dyn ExtractionClient>,
    ) -> (Arc<Self>, mpsc::Receiver<Uuid>) {
        let sources = Arc::new(SourceRepositoryImpl::new(store.clone()));
        let tasks = Arc::new(TaskRepositoryImpl::new(store.clone()));
        let executions = Arc::new(ExecutionRepositoryImpl::new(store.clone()));
        let activities: Arc<dyn ActivityRepository> =
            Arc::new(ActivityRepositoryImpl::new(store.clone()));
        let events = Arc::new(AdminEventRepositoryImpl::new(store.clone()));

        let scheduler = Arc::new(TaskScheduler::new(
            tasks.clone(),
            executions.clone(),
            settings.scheduler.clone(),
        ));
        let (queue, signals) = AnalysisQueue::channel(ANALYSIS_QUEUE_CAPACITY);
        let registry = Arc::new(SourceRegistry::new(
            sources,
            scheduler.clone(),
            queue,
            settings.source_defaults(),
        ));

        let scorer = QualityScorer::new(settings.quality.clone());
        let profile = client_profile(&settings.extraction);
        let analyzer = Arc::new(SourceAnalyzer::new(
            client.clone(),
            scorer.clone(),
            profile.clone(),
            settings.scheduler.clone(),
        ));
        let review = Arc::new(ReviewPipeline::new(
            events,
            activities.clone(),
            registry.clone(),
            client.clone(),
            Arc::new(SchemaConverter::new()),
            profile,
            settings.engine.min_content_length,
        ));
        let engine = Arc::new(ExecutionEngine::new(
            client,
            activities.clone(),
            ErrorPolicyTable::from_settings(&settings.engine, &settings.extraction),
            scorer,
            settings.engine.clone(),
        ));
        let runner = Arc::new(TaskRunner::new(
            scheduler.clone(),
            tasks,
            executions,
            registry.clone(),
            engine,
            review.clone(),
            &settings.engine,
        ));

        let state = Arc::new(Self {
            settings,
            store,
            activities,
            scheduler,
            registry,
            analyzer,
            review,
            runner,
        });
        (state, signals)
    }
}

/// 管理端直接调用提取服务时使用的客户端参数
fn client_profile(extraction: &ExtractionSettings) -> ClientProfile {
    ClientProfile {
        user_agent: extraction
            .user_agents
            .first()
            .cloned()
            .unwrap_or_else(|| format!("harvestrs/{}", env!("CARGO_PKG_VERSION"))),
        timeout: Duration::from_secs(extraction.request_timeout_secs.max(1)),
    }
}
