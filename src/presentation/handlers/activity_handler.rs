// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::activity_query::{ActivityListResponseDto, ActivityQueryDto};
use crate::application::state::AppState;
use crate::domain::repositories::activity_repository::ActivityQuery;
use crate::presentation::errors::AppError;
use crate::utils::errors::ServiceError;
use axum::{
    extract::{Extension, Query},
    Json,
};
use std::sync::Arc;
use validator::Validate;

/// 公开活动列表
///
/// 支持按分类、开始日期和更新时间过滤，`updated_since` 用于客户端增量同步
pub async fn list_activities(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ActivityQueryDto>,
) -> Result<Json<ActivityListResponseDto>, AppError> {
    query.validate()?;
    let query = ActivityQuery::from(query);
    let page = state
        .activities
        .list(&query)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(ActivityListResponseDto::new(page, &query)))
}
