// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::source::SourceConfig;
use crate::domain::models::task::{Priority, Task, TaskType};
use crate::domain::repositories::execution_repository::ExecutionRepository;
use crate::domain::repositories::task_repository::{PendingClaim, TaskRepository};
use crate::queue::frequency::{adapt_frequency, FrequencyDecision};
use crate::utils::errors::ServiceError;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 调度结果
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Task,
    /// 是否复用了已存在的待执行任务
    pub reused: bool,
}

/// 任务调度器
///
/// 负责创建任务、计算下次运行时间和自适应频率，
/// 并保证同一数据源同一类型同时至多一个待执行任务
pub struct TaskScheduler {
    /// 任务仓库
    tasks: Arc<dyn TaskRepository>,
    /// 执行记录仓库
    executions: Arc<dyn ExecutionRepository>,
    settings: SchedulerSettings,
}

impl TaskScheduler {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `executions` - 执行记录仓库，用于自适应频率
    /// * `settings` - 调度器配置
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        executions: Arc<dyn ExecutionRepository>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            tasks,
            executions,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    fn task_ttl(&self) -> Duration {
        Duration::days(self.settings.task_ttl_days.max(1))
    }

    /// 调度一个初始任务（激活后的首次抓取等），在短暂延迟后运行
    ///
    /// 已有同类待执行任务时直接复用
    #[instrument(skip(self))]
    pub async fn schedule(
        &self,
        source_id: Uuid,
        task_type: TaskType,
        priority: Priority,
    ) -> Result<ScheduledTask, ServiceError> {
        let at = Utc::now() + Duration::seconds(self.settings.initial_delay_secs.max(0));
        let task = Task::new(
            source_id,
            task_type,
            priority,
            at,
            self.settings.default_max_retries,
            self.task_ttl(),
        );
        self.create_or_reuse(task).await
    }

    /// 按自适应频率调度下一次增量任务
    ///
    /// # 返回值
    ///
    /// 调度结果以及新的抓取间隔，调用方负责把间隔写回数据源配置
    #[instrument(skip(self, config), fields(source_id = %config.source_id))]
    pub async fn schedule_next(
        &self,
        config: &SourceConfig,
    ) -> Result<(ScheduledTask, FrequencyDecision), ServiceError> {
        let decision = self.next_frequency(config).await?;
        let at = Utc::now() + Duration::hours(decision.hours as i64);
        let task = Task::new(
            config.source_id,
            TaskType::Incremental,
            config.priority,
            at,
            self.settings.default_max_retries,
            self.task_ttl(),
        );
        let scheduled = self.create_or_reuse(task).await?;
        debug!(
            "Next run for source {} in {}h ({:?})",
            config.source_id, decision.hours, decision.adjustment
        );
        Ok((scheduled, decision))
    }

    /// 计算数据源的新抓取间隔
    pub async fn next_frequency(
        &self,
        config: &SourceConfig,
    ) -> Result<FrequencyDecision, ServiceError> {
        let recent = self
            .executions
            .recent_for_source(config.source_id, self.settings.stability_window.max(1))
            .await?;
        Ok(adapt_frequency(
            config.frequency_hours,
            config.reliability_score,
            &recent,
            &self.settings,
        ))
    }

    /// 手动触发抓取
    ///
    /// 绕过计算出的计划时间，`scheduled_time = now + manual_delay`，使用较少的重试次数。
    /// 已有待执行的完整抓取任务时，把它提前并标记为手动触发
    #[instrument(skip(self))]
    pub async fn trigger_manual(
        &self,
        source_id: Uuid,
        requested_by: &str,
    ) -> Result<ScheduledTask, ServiceError> {
        let at = Utc::now() + Duration::seconds(self.settings.manual_delay_secs.max(0));
        let task = Task::new(
            source_id,
            TaskType::FullScrape,
            Priority::High,
            at,
            self.settings.manual_max_retries,
            self.task_ttl(),
        )
        .requested_by(requested_by);

        let mut scheduled = self.create_or_reuse(task).await?;
        if scheduled.reused {
            let mut existing = scheduled.task;
            existing.manual = true;
            existing.requested_by = Some(requested_by.to_string());
            existing.priority = Priority::High;
            existing.scheduled_time = existing.scheduled_time.min(at);
            existing.max_retries = existing.max_retries.min(self.settings.manual_max_retries);
            existing.updated_at = Utc::now();
            scheduled.task = self.tasks.update(&existing).await?;
        }
        info!(
            "Manual scrape for source {} requested by {} (task {}, reused: {})",
            source_id, requested_by, scheduled.task.id, scheduled.reused
        );
        Ok(scheduled)
    }

    /// 返回到期可运行的任务
    ///
    /// 按优先级桶（high、medium、low）、计划时间、数据源ID排序后截取前 `limit` 个
    pub async fn next_runnable(
        &self,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Task>, ServiceError> {
        let mut due = self.tasks.find_due(before).await?;
        due.retain(|t| t.is_pending() && t.scheduled_time <= before);
        due.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(a.scheduled_time.cmp(&b.scheduled_time))
                .then(a.source_id.cmp(&b.source_id))
        });
        due.truncate(limit);
        Ok(due)
    }

    /// 失败任务重试：重新占用待执行槽位并按退避时间重新调度
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(Task))` - 已重新调度
    /// * `Ok(None)` - 同类任务已在等待，本任务不再重试
    pub async fn reschedule_retry(
        &self,
        task: Task,
        at: DateTime<Utc>,
    ) -> Result<Option<Task>, ServiceError> {
        if !task.can_retry() {
            return Ok(None);
        }
        let claim = self
            .tasks
            .claim_pending_slot(task.source_id, task.task_type, task.id, task.expires_at.max(at))
            .await?;
        if let PendingClaim::Existing(other) = claim {
            debug!(
                "Not retrying task {}: task {} is already pending for source {}",
                task.id, other, task.source_id
            );
            return Ok(None);
        }
        let retried = task.retry_at(at)?;
        match self.tasks.update(&retried).await {
            Ok(updated) => Ok(Some(updated)),
            Err(e) => {
                self.release_quietly(&retried).await;
                Err(e.into())
            }
        }
    }

    /// 占用槽位后写入任务，或者复用已有任务
    async fn create_or_reuse(&self, task: Task) -> Result<ScheduledTask, ServiceError> {
        let claim = self
            .tasks
            .claim_pending_slot(task.source_id, task.task_type, task.id, task.expires_at)
            .await?;

        match claim {
            PendingClaim::Claimed => match self.tasks.create(&task).await {
                Ok(created) => {
                    counter!("tasks_scheduled_total").increment(1);
                    info!(
                        "Scheduled {} task {} for source {} at {}",
                        created.task_type, created.id, created.source_id, created.scheduled_time
                    );
                    Ok(ScheduledTask {
                        task: created,
                        reused: false,
                    })
                }
                Err(e) => {
                    self.release_quietly(&task).await;
                    Err(e.into())
                }
            },
            PendingClaim::Existing(existing_id) => {
                let existing = self.tasks.find_by_id(existing_id).await?;
                match existing {
                    Some(existing) => {
                        counter!("tasks_reused_total").increment(1);
                        debug!(
                            "Reusing pending {} task {} for source {}",
                            existing.task_type, existing.id, existing.source_id
                        );
                        Ok(ScheduledTask {
                            task: existing,
                            reused: true,
                        })
                    }
                    None => Err(ServiceError::Conflict(format!(
                        "a {} task for source {} is being scheduled concurrently",
                        task.task_type, task.source_id
                    ))),
                }
            }
        }
    }

    /// 释放槽位，失败只记录日志
    pub async fn release_quietly(&self, task: &Task) {
        if let Err(e) = self
            .tasks
            .release_pending_slot(task.source_id, task.task_type, task.id)
            .await
        {
            warn!("Failed to release pending slot for task {}: {}", task.id, e);
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
