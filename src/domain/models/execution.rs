// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error::DomainError;
use crate::domain::models::task::Task;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionOutcome::Running => write!(f, "running"),
            ExecutionOutcome::Succeeded => write!(f, "succeeded"),
            ExecutionOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// 执行完成时的统计数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    pub items_extracted: u32,
    pub items_processed: u32,
    pub items_stored: u32,
    pub attempts: u32,
    pub content_hash: Option<String>,
    pub quality_score: f64,
    pub credits_used: u64,
    pub tokens_used: u64,
}

/// 一次任务运行的记录
///
/// 在任务开始时创建，结束时定稿，定稿后不可再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub task_id: Uuid,
    pub source_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_extracted: u32,
    pub items_processed: u32,
    pub items_stored: u32,
    pub outcome: ExecutionOutcome,
    pub attempts: u32,
    pub error: Option<String>,
    pub content_hash: Option<String>,
    pub quality_score: f64,
    pub credits_used: u64,
    pub tokens_used: u64,
    pub expires_at: DateTime<Utc>,
}

impl Execution {
    /// 为任务开启一条执行记录
    pub fn start(task: &Task, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id: task.id,
            source_id: task.source_id,
            started_at: now,
            finished_at: None,
            items_extracted: 0,
            items_processed: 0,
            items_stored: 0,
            outcome: ExecutionOutcome::Running,
            attempts: 0,
            error: None,
            content_hash: None,
            quality_score: 0.0,
            credits_used: 0,
            tokens_used: 0,
            expires_at: now + ttl,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome != ExecutionOutcome::Running
    }

    /// 定稿执行记录
    ///
    /// # 参数
    ///
    /// * `stats` - 本次运行的统计数据
    /// * `error` - 失败原因，`None` 表示成功
    ///
    /// # 返回值
    ///
    /// 已定稿的记录再次定稿时返回 `DomainError::AlreadyFinalized`
    pub fn finalize(
        &mut self,
        stats: ExecutionStats,
        error: Option<String>,
    ) -> Result<(), DomainError> {
        if self.is_finalized() {
            return Err(DomainError::AlreadyFinalized);
        }
        self.items_extracted = stats.items_extracted;
        self.items_processed = stats.items_processed;
        self.items_stored = stats.items_stored;
        self.attempts = stats.attempts;
        self.content_hash = stats.content_hash;
        self.quality_score = stats.quality_score;
        self.credits_used = stats.credits_used;
        self.tokens_used = stats.tokens_used;
        self.outcome = if error.is_none() {
            ExecutionOutcome::Succeeded
        } else {
            ExecutionOutcome::Failed
        };
        self.error = error;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// 运行耗时（毫秒）
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
