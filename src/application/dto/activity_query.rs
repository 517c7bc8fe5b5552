// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::Activity;
use crate::domain::repositories::activity_repository::{ActivityPage, ActivityQuery};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// 公开活动列表查询参数
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct ActivityQueryDto {
    pub category: Option<String>,
    /// 只返回该日期及之后开始的活动
    pub date_from: Option<NaiveDate>,
    /// 增量同步：只返回此后更新过的活动
    pub updated_since: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<ActivityQueryDto> for ActivityQuery {
    fn from(dto: ActivityQueryDto) -> Self {
        ActivityQuery {
            category: dto
                .category
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            date_from: dto.date_from,
            updated_since: dto.updated_since,
            limit: dto.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: dto.offset.unwrap_or(0),
        }
    }
}

/// 列表元数据
#[derive(Debug, Deserialize, Serialize)]
pub struct ActivityListMeta {
    pub total: u64,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// 公开活动列表响应
#[derive(Debug, Deserialize, Serialize)]
pub struct ActivityListResponseDto {
    pub activities: Vec<Activity>,
    pub meta: ActivityListMeta,
}

impl ActivityListResponseDto {
    pub fn new(page: ActivityPage, query: &ActivityQuery) -> Self {
        let meta = ActivityListMeta {
            total: page.total,
            count: page.activities.len(),
            limit: query.limit,
            offset: query.offset,
            last_updated: page.last_updated,
        };
        Self {
            activities: page.activities,
            meta,
        }
    }
}
