// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source::{Source, SourceAnalysis, SourceConfig, SourceStatus};
use crate::domain::repositories::store::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 数据源仓库特质
///
/// 管理 Source Management 分区：每个数据源的提交、分析与配置三条记录
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// 创建新数据源
    async fn create(&self, source: &Source) -> Result<Source, RepositoryError>;
    /// 根据ID查找数据源
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>, RepositoryError>;
    /// 更新数据源（状态、备注）
    async fn update(&self, source: &Source) -> Result<Source, RepositoryError>;
    /// 按状态列出数据源，高优先级在前，同优先级按创建时间倒序
    async fn list_by_status(
        &self,
        status: SourceStatus,
        limit: usize,
    ) -> Result<Vec<Source>, RepositoryError>;
    /// 根据规范化后的URL查找数据源
    async fn find_by_url(&self, url: &str) -> Result<Option<Source>, RepositoryError>;
    /// 根据域名查找数据源
    async fn find_by_domain(&self, domain: &str) -> Result<Vec<Source>, RepositoryError>;
    /// 保存（覆盖）分析结果
    async fn save_analysis(&self, analysis: &SourceAnalysis) -> Result<(), RepositoryError>;
    /// 查找分析结果
    async fn find_analysis(&self, source_id: Uuid)
        -> Result<Option<SourceAnalysis>, RepositoryError>;
    /// 创建抓取配置，已存在时返回 `RepositoryError::AlreadyExists`
    async fn create_config(&self, config: &SourceConfig) -> Result<(), RepositoryError>;
    /// 更新抓取配置
    async fn update_config(&self, config: &SourceConfig) -> Result<(), RepositoryError>;
    /// 查找抓取配置
    async fn find_config(&self, source_id: Uuid) -> Result<Option<SourceConfig>, RepositoryError>;
    /// 列出所有启用的抓取配置
    async fn list_enabled_configs(&self) -> Result<Vec<SourceConfig>, RepositoryError>;
    /// 删除数据源的全部记录，返回删除的记录数
    async fn delete_all(&self, source_id: Uuid) -> Result<u64, RepositoryError>;
}
