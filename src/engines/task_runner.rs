// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::EngineSettings;
use crate::domain::models::admin_event::ExtractionSchema;
use crate::domain::models::execution::{Execution, ExecutionStats};
use crate::domain::models::source::SourceConfig;
use crate::domain::models::task::Task;
use crate::domain::repositories::execution_repository::ExecutionRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::services::review_service::{CandidateBatch, ReviewPipeline};
use crate::domain::services::source_registry::SourceRegistry;
use crate::engines::execution_engine::{BatchSummary, ExecutionEngine, SourceRunResult};
use crate::queue::scheduler::TaskScheduler;
use crate::utils::errors::ServiceError;
use crate::utils::retry_policy::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 一轮任务运行的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskRunSummary {
    pub tasks_started: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub retries_scheduled: usize,
    /// 转交审核流程的新记录数
    pub events_created: usize,
    pub batch: BatchSummary,
}

/// 已启动的任务及其执行记录
struct StartedTask {
    task: Task,
    execution: Execution,
    config: SourceConfig,
}

/// 任务运行器
///
/// 把到期任务交给执行引擎，并把结果回写到任务、执行记录、数据源配置和审核流程
pub struct TaskRunner {
    scheduler: Arc<TaskScheduler>,
    tasks: Arc<dyn TaskRepository>,
    executions: Arc<dyn ExecutionRepository>,
    registry: Arc<SourceRegistry>,
    engine: Arc<ExecutionEngine>,
    review: Arc<ReviewPipeline>,
    backoff: RetryPolicy,
}

impl TaskRunner {
    pub fn new(
        scheduler: Arc<TaskScheduler>,
        tasks: Arc<dyn TaskRepository>,
        executions: Arc<dyn ExecutionRepository>,
        registry: Arc<SourceRegistry>,
        engine: Arc<ExecutionEngine>,
        review: Arc<ReviewPipeline>,
        engine_settings: &EngineSettings,
    ) -> Self {
        let backoff = RetryPolicy::new(
            u32::MAX,
            engine_settings.backoff_unit(),
            engine_settings.max_backoff(),
        );
        Self {
            scheduler,
            tasks,
            executions,
            registry,
            engine,
            review,
            backoff,
        }
    }

    /// 运行所有到期任务
    ///
    /// 同一数据源本轮只运行排序最靠前的任务，其余留到下一轮
    #[instrument(skip(self))]
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<TaskRunSummary, ServiceError> {
        let batch_size = self.scheduler.settings().batch_size.max(1);
        let due = self.scheduler.next_runnable(now, batch_size).await?;
        if due.is_empty() {
            debug!("No due tasks");
            return Ok(TaskRunSummary::default());
        }

        let mut seen = HashSet::new();
        let mut started = Vec::new();
        let mut summary = TaskRunSummary::default();
        for task in due {
            if !seen.insert(task.source_id) {
                debug!(
                    "Task {} deferred: source {} already runs this round",
                    task.id, task.source_id
                );
                continue;
            }
            match self.start(task).await {
                Ok(Some(entry)) => started.push(entry),
                Ok(None) => summary.tasks_failed += 1,
                Err(e) => warn!("Could not start task: {}", e),
            }
        }
        summary.tasks_started = started.len();
        if started.is_empty() {
            return Ok(summary);
        }

        let configs: Vec<SourceConfig> = started.iter().map(|s| s.config.clone()).collect();
        let ids: Vec<_> = configs.iter().map(|c| c.source_id).collect();
        let mut batch = self.engine.run_batch(configs, Some(&ids)).await;

        for entry in started {
            let result = batch
                .results
                .iter_mut()
                .find(|r| r.source_id == entry.config.source_id);
            let Some(result) = result else {
                warn!("No batch result for source {}", entry.config.source_id);
                continue;
            };
            match self.finish(entry, result).await {
                Ok(outcome) => {
                    if outcome.success {
                        summary.tasks_completed += 1;
                    } else {
                        summary.tasks_failed += 1;
                    }
                    if outcome.retried {
                        summary.retries_scheduled += 1;
                    }
                    summary.events_created += outcome.events_created;
                }
                Err(e) => error!("Failed to record task result: {}", e),
            }
        }

        info!(
            "Task run: {} started, {} completed, {} failed, {} retries, {} new event(s)",
            summary.tasks_started,
            summary.tasks_completed,
            summary.tasks_failed,
            summary.retries_scheduled,
            summary.events_created
        );
        summary.batch = batch;
        Ok(summary)
    }

    /// 启动任务：`scheduled → queued → in_progress`，并开启执行记录
    ///
    /// 数据源没有启用的配置时任务直接失败，返回 `None`
    async fn start(&self, task: Task) -> Result<Option<StartedTask>, ServiceError> {
        let config = self
            .registry
            .find_config(task.source_id)
            .await?
            .filter(|c| c.enabled);

        let execution = Execution::start(
            &task,
            Duration::days(self.scheduler.settings().execution_ttl_days.max(1)),
        );
        let task = task.enqueue()?.start(execution.id)?;
        let task = self.tasks.update(&task).await?;
        // 已开始的任务不再占用待执行槽位
        self.scheduler.release_quietly(&task).await;

        let Some(config) = config else {
            warn!(
                "Source {} has no enabled config; failing task {}",
                task.source_id, task.id
            );
            let failed = task.fail("source has no enabled config")?;
            self.tasks.update(&failed).await?;
            return Ok(None);
        };

        let execution = self.executions.create(&execution).await?;
        Ok(Some(StartedTask {
            task,
            execution,
            config,
        }))
    }

    async fn finish(
        &self,
        entry: StartedTask,
        result: &mut SourceRunResult,
    ) -> Result<FinishOutcome, ServiceError> {
        let StartedTask {
            task,
            mut execution,
            mut config,
        } = entry;

        let events_created = if result.success && !result.candidates.is_empty() {
            self.review
                .ingest_candidates(CandidateBatch {
                    source_id: config.source_id,
                    source_url: result.source_url.clone(),
                    schema: result.schema.clone().unwrap_or(ExtractionSchema::Event),
                    candidates: std::mem::take(&mut result.candidates),
                })
                .await
        } else {
            0
        };

        execution.finalize(
            ExecutionStats {
                items_extracted: result.activities_found as u32,
                items_processed: result.unique_activities as u32,
                items_stored: events_created as u32,
                attempts: result.attempts,
                content_hash: result.content_hash.clone(),
                quality_score: result.quality_score,
                credits_used: result.credits_used,
                tokens_used: result.tokens_used,
            },
            result.error.clone(),
        )?;
        self.executions.update(&execution).await?;

        let mut retried = false;
        if result.success {
            self.tasks.update(&task.complete()?).await?;
        } else {
            let failed = task.fail(result.error.clone().unwrap_or_default())?;
            let failed = self.tasks.update(&failed).await?;
            if !result.retryable {
                info!("Task {} failed terminally: {:?}", failed.id, failed.last_error);
            } else {
                let at = self
                    .backoff
                    .next_retry_time(failed.retry_count + 1, Utc::now());
                if let Some(retry) = self.scheduler.reschedule_retry(failed, at).await? {
                    info!(
                        "Task {} rescheduled for retry {} at {}",
                        retry.id, retry.retry_count, retry.scheduled_time
                    );
                    retried = true;
                }
            }
        }

        config.record_run(result.success, result.content_hash.clone());
        if !retried {
            let (next, decision) = self.scheduler.schedule_next(&config).await?;
            config.frequency_hours = decision.hours;
            debug!(
                "Source {} next task {} at {}",
                config.source_id, next.task.id, next.task.scheduled_time
            );
        }
        self.registry.update_config(&config).await?;

        Ok(FinishOutcome {
            success: result.success,
            retried,
            events_created,
        })
    }
}

struct FinishOutcome {
    success: bool,
    retried: bool,
    events_created: usize,
}

#[cfg(test)]
#[path = "task_runner_test.rs"]
mod task_runner_test;
