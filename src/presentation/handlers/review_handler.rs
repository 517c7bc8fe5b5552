// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::response::ApiResponse;
use crate::application::dto::review_request::{
    ApproveEventRequestDto, CrawlRequestDto, CrawlResponseDto, EditEventRequestDto,
    EventListQueryDto, RejectEventRequestDto,
};
use crate::application::state::AppState;
use crate::domain::models::admin_event::{AdminEvent, AdminEventStatus};
use crate::domain::services::review_service::{Approval, ReviewedEvent};
use crate::presentation::errors::AppError;
use crate::utils::errors::ServiceError;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 管理员抓取：调用提取服务并生成待审核事件
pub async fn submit_crawl(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CrawlRequestDto>,
) -> Result<(StatusCode, Json<ApiResponse<CrawlResponseDto>>), AppError> {
    payload.validate()?;
    let reviewed = state.review.submit_crawl(payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            CrawlResponseDto::from(&reviewed),
            "extraction stored for review",
        )),
    ))
}

/// 按状态列出审核事件
pub async fn list_events(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<EventListQueryDto>,
) -> Result<Json<ApiResponse<Vec<AdminEvent>>>, AppError> {
    query.validate()?;
    let status = match query.status.as_deref() {
        Some(raw) => raw
            .parse::<AdminEventStatus>()
            .map_err(ServiceError::from)?,
        None => AdminEventStatus::Pending,
    };
    let events = state
        .review
        .list_events(status, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(ApiResponse::ok(events)))
}

/// 审核事件详情，附带最新的转换预览
pub async fn get_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReviewedEvent>>, AppError> {
    let reviewed = state.review.get_event(id).await?;
    Ok(Json(ApiResponse::ok(reviewed)))
}

/// 批准事件并发布活动
pub async fn approve_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveEventRequestDto>,
) -> Result<Json<ApiResponse<Approval>>, AppError> {
    payload.validate()?;
    let approval = state
        .review
        .approve(id, &payload.reviewer, payload.notes)
        .await?;
    let message = if approval.warnings.is_empty() {
        "activity published".to_string()
    } else {
        format!(
            "activity published with {} warning(s)",
            approval.warnings.len()
        )
    };
    Ok(Json(ApiResponse::with_message(approval, message)))
}

/// 拒绝事件
pub async fn reject_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectEventRequestDto>,
) -> Result<Json<ApiResponse<AdminEvent>>, AppError> {
    payload.validate()?;
    let event = state
        .review
        .reject(id, &payload.reviewer, payload.reason)
        .await?;
    Ok(Json(ApiResponse::with_message(event, "event rejected")))
}

/// 修改原始数据并重新生成预览
pub async fn edit_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EditEventRequestDto>,
) -> Result<Json<ApiResponse<ReviewedEvent>>, AppError> {
    payload.validate()?;
    let reviewed = state
        .review
        .edit(id, payload.raw_data, &payload.reviewer, payload.notes)
        .await?;
    Ok(Json(ApiResponse::with_message(reviewed, "event updated")))
}
