// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::execution::Execution;
use crate::domain::repositories::store::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 执行记录仓库特质
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// 创建执行记录
    async fn create(&self, execution: &Execution) -> Result<Execution, RepositoryError>;
    /// 更新执行记录
    async fn update(&self, execution: &Execution) -> Result<Execution, RepositoryError>;
    /// 根据ID查找执行记录
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Execution>, RepositoryError>;
    /// 数据源最近的执行记录，按开始时间倒序
    async fn recent_for_source(
        &self,
        source_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Execution>, RepositoryError>;
}
