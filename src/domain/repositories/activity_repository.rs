// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::Activity;
use crate::domain::repositories::store::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// 公开活动列表查询参数
#[derive(Debug, Default, Clone)]
pub struct ActivityQuery {
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub updated_since: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

/// 活动列表分页结果
#[derive(Debug, Clone, Default)]
pub struct ActivityPage {
    pub activities: Vec<Activity>,
    pub total: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// 活动仓库特质
///
/// 管理 Business Entities 分区中已发布的活动
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// 创建活动
    ///
    /// 先原子地占用去重键，键已被占用时返回 `RepositoryError::AlreadyExists`
    async fn create(&self, activity: &Activity) -> Result<Activity, RepositoryError>;
    /// 根据ID查找活动
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Activity>, RepositoryError>;
    /// 去重键是否已被已发布的活动占用
    async fn exists_by_dedup_key(&self, key: &str) -> Result<bool, RepositoryError>;
    /// 公开列表，按更新时间倒序
    async fn list(&self, query: &ActivityQuery) -> Result<ActivityPage, RepositoryError>;
    /// 删除活动并释放去重键
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
    /// 按地点和日期查询
    async fn find_by_location_date(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Vec<Activity>, RepositoryError>;
    /// 按分类和年龄段查询
    async fn find_by_category_age(
        &self,
        category: &str,
        age_group: &str,
    ) -> Result<Vec<Activity>, RepositoryError>;
    /// 按所属场馆查询
    async fn find_by_venue(&self, venue_id: Uuid) -> Result<Vec<Activity>, RepositoryError>;
    /// 按提供方查询
    async fn find_by_provider(&self, provider: &str) -> Result<Vec<Activity>, RepositoryError>;
}
