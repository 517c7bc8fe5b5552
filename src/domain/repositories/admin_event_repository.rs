// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::admin_event::{AdminEvent, AdminEventStatus};
use crate::domain::repositories::store::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 审核事件仓库特质
#[async_trait]
pub trait AdminEventRepository: Send + Sync {
    /// 创建审核事件
    async fn create(&self, event: &AdminEvent) -> Result<AdminEvent, RepositoryError>;
    /// 根据ID查找审核事件
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminEvent>, RepositoryError>;
    /// 更新审核事件
    async fn update(&self, event: &AdminEvent) -> Result<AdminEvent, RepositoryError>;
    /// 按状态列出，最新的在前
    async fn list_by_status(
        &self,
        status: AdminEventStatus,
        limit: usize,
    ) -> Result<Vec<AdminEvent>, RepositoryError>;
    /// 查找同一URL（规范化后）的全部事件
    async fn find_by_url(&self, url: &str) -> Result<Vec<AdminEvent>, RepositoryError>;
    /// 查找原始数据去重键相同的全部事件
    async fn find_by_dedup_key(&self, key: &str) -> Result<Vec<AdminEvent>, RepositoryError>;
}
