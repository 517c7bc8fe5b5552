// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::store::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 待执行任务槽位的占用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingClaim {
    /// 槽位空闲，已由当前任务占用
    Claimed,
    /// 槽位已被另一个待执行任务占用
    Existing(Uuid),
}

/// 任务仓库特质
///
/// 定义任务数据访问接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;
    /// 更新任务
    async fn update(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 查找计划时间不晚于 `before` 的已调度任务
    async fn find_due(&self, before: DateTime<Utc>) -> Result<Vec<Task>, RepositoryError>;
    /// 列出数据源的任务，按优先级和计划时间排序
    async fn list_by_source(&self, source_id: Uuid) -> Result<Vec<Task>, RepositoryError>;
    /// 占用 `(source, type)` 的待执行槽位
    ///
    /// 同一数据源同一类型同时至多一个待执行任务，并发调度时只有一个调用能占到槽位
    async fn claim_pending_slot(
        &self,
        source_id: Uuid,
        task_type: TaskType,
        task_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<PendingClaim, RepositoryError>;
    /// 释放槽位，仅当槽位仍由 `task_id` 占用时生效
    async fn release_pending_slot(
        &self,
        source_id: Uuid,
        task_type: TaskType,
        task_id: Uuid,
    ) -> Result<(), RepositoryError>;
}
