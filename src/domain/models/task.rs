// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error::DomainError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 优先级
///
/// 声明顺序即排序顺序：High < Medium < Low，排序后高优先级在前。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// 排序桶序号，数值越小越优先
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(DomainError::ValidationError(format!(
                "unknown priority: {}",
                other
            ))),
        }
    }
}

/// 任务类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 完整抓取所有目标页面
    #[default]
    FullScrape,
    /// 增量抓取，数据源激活之后的周期性任务
    Incremental,
    /// 校验数据源配置是否仍然有效
    Validation,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::FullScrape => write!(f, "full_scrape"),
            TaskType::Incremental => write!(f, "incremental"),
            TaskType::Validation => write!(f, "validation"),
        }
    }
}

impl FromStr for TaskType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_scrape" => Ok(TaskType::FullScrape),
            "incremental" => Ok(TaskType::Incremental),
            "validation" => Ok(TaskType::Validation),
            other => Err(DomainError::ValidationError(format!(
                "unknown task type: {}",
                other
            ))),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Scheduled → Queued → InProgress → Completed/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 已调度，等待到期
    #[default]
    Scheduled,
    /// 已到期并被批次选中
    Queued,
    /// 执行中
    InProgress,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
}

impl TaskStatus {
    /// 是否仍处于待执行状态
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Queued)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Scheduled => write!(f, "scheduled"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TaskStatus::Scheduled),
            "queued" => Ok(TaskStatus::Queued),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown task status: {}",
                other
            ))),
        }
    }
}

/// 任务实体
///
/// 针对单个数据源的一次计划抓取。由调度器创建，只由执行引擎修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 所属数据源
    pub source_id: Uuid,
    /// 任务类型
    pub task_type: TaskType,
    /// 任务优先级
    pub priority: Priority,
    /// 任务状态
    pub status: TaskStatus,
    /// 计划执行时间，不早于创建时间
    pub scheduled_time: DateTime<Utc>,
    /// 已重试次数
    pub retry_count: u32,
    /// 最大重试次数
    pub max_retries: u32,
    /// 是否由管理员手动触发
    pub manual: bool,
    /// 手动触发人
    pub requested_by: Option<String>,
    /// 自动过期时间
    pub expires_at: DateTime<Utc>,
    /// 最近一次失败原因
    pub last_error: Option<String>,
    /// 最近一次执行记录
    pub execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// 创建一个新的任务
    ///
    /// `scheduled_time` 早于当前时间时会被提升到当前时间
    pub fn new(
        source_id: Uuid,
        task_type: TaskType,
        priority: Priority,
        scheduled_time: DateTime<Utc>,
        max_retries: u32,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let scheduled_time = scheduled_time.max(now);
        Self {
            id: Uuid::new_v4(),
            source_id,
            task_type,
            priority,
            status: TaskStatus::Scheduled,
            scheduled_time,
            retry_count: 0,
            max_retries,
            manual: false,
            requested_by: None,
            expires_at: scheduled_time + ttl,
            last_error: None,
            execution_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// 标记为手动触发
    pub fn requested_by(mut self, requester: impl Into<String>) -> Self {
        self.manual = true;
        self.requested_by = Some(requester.into());
        self
    }

    /// 是否仍处于待执行状态
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// 批次选中任务：Scheduled → Queued
    pub fn enqueue(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Scheduled => {
                self.status = TaskStatus::Queued;
                self.updated_at = Utc::now();
                Ok(self)
            }
            other => Err(DomainError::transition(other, TaskStatus::Queued)),
        }
    }

    /// 启动任务：Scheduled/Queued → InProgress
    pub fn start(mut self, execution_id: Uuid) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Scheduled | TaskStatus::Queued => {
                let now = Utc::now();
                self.status = TaskStatus::InProgress;
                self.execution_id = Some(execution_id);
                self.started_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, TaskStatus::InProgress)),
        }
    }

    /// 完成任务：InProgress → Completed
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::InProgress => {
                let now = Utc::now();
                self.status = TaskStatus::Completed;
                self.completed_at = Some(now);
                self.updated_at = now;
                self.last_error = None;
                Ok(self)
            }
            other => Err(DomainError::transition(other, TaskStatus::Completed)),
        }
    }

    /// 标记任务失败：InProgress → Failed
    pub fn fail(mut self, error: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::InProgress => {
                let now = Utc::now();
                self.status = TaskStatus::Failed;
                self.completed_at = Some(now);
                self.updated_at = now;
                self.last_error = Some(error.into());
                Ok(self)
            }
            other => Err(DomainError::transition(other, TaskStatus::Failed)),
        }
    }

    /// 判断任务是否可以重试
    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count < self.max_retries
    }

    /// 重新调度失败的任务：Failed → Scheduled
    pub fn retry_at(mut self, at: DateTime<Utc>) -> Result<Self, DomainError> {
        if !self.can_retry() {
            return Err(DomainError::transition(self.status, TaskStatus::Scheduled));
        }
        self.status = TaskStatus::Scheduled;
        self.retry_count += 1;
        self.scheduled_time = at.max(Utc::now());
        self.started_at = None;
        self.completed_at = None;
        self.updated_at = Utc::now();
        if self.expires_at < self.scheduled_time {
            self.expires_at = self.scheduled_time + Duration::days(1);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> Task {
        Task::new(
            Uuid::new_v4(),
            TaskType::FullScrape,
            Priority::High,
            Utc::now(),
            2,
            Duration::days(7),
        )
    }

    #[test]
    fn test_task_lifecycle_happy_path() {
        let task = new_task();
        assert_eq!(task.status, TaskStatus::Scheduled);

        let task = task.enqueue().unwrap().start(Uuid::new_v4()).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.started_at.is_some());

        let task = task.complete().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.complete().is_err());
    }

    #[test]
    fn test_scheduled_time_never_before_creation() {
        let task = Task::new(
            Uuid::new_v4(),
            TaskType::Incremental,
            Priority::Low,
            Utc::now() - Duration::hours(3),
            3,
            Duration::days(1),
        );
        assert!(task.scheduled_time >= task.created_at);
        assert!(task.expires_at > task.scheduled_time);
    }

    #[test]
    fn test_task_retry_logic() {
        let task = new_task().start(Uuid::new_v4()).unwrap().fail("boom").unwrap();
        assert!(task.can_retry());

        let task = task.retry_at(Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::Scheduled);
        assert_eq!(task.retry_count, 1);

        let task = task
            .start(Uuid::new_v4())
            .unwrap()
            .fail("boom again")
            .unwrap()
            .retry_at(Utc::now())
            .unwrap()
            .start(Uuid::new_v4())
            .unwrap()
            .fail("still failing")
            .unwrap();

        // retry_count == max_retries
        assert!(!task.can_retry());
        assert!(task.retry_at(Utc::now()).is_err());
    }

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
        assert_eq!("medium".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
