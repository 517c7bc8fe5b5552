// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::response::ApiResponse;
use crate::application::dto::source_request::{
    ActivateSourceRequestDto, DeleteSourceRequestDto, ManualScrapeRequestDto,
    RejectSourceRequestDto, SourceListQueryDto, SubmitSourceRequestDto, SubmitSourceResponseDto,
};
use crate::application::state::AppState;
use crate::domain::models::source::{Source, SourceStatus};
use crate::domain::models::task::Task;
use crate::domain::services::source_registry::SourceDetail;
use crate::presentation::errors::AppError;
use crate::utils::errors::ServiceError;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 提交数据源
pub async fn submit_source(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SubmitSourceRequestDto>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitSourceResponseDto>>), AppError> {
    payload.validate()?;
    let source = state.registry.submit(payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            SubmitSourceResponseDto {
                source_id: source.id,
            },
            "source submitted for analysis",
        )),
    ))
}

/// 按状态列出数据源
pub async fn list_sources(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SourceListQueryDto>,
) -> Result<Json<ApiResponse<Vec<Source>>>, AppError> {
    query.validate()?;
    let status = match query.status.as_deref() {
        Some(raw) => raw.parse::<SourceStatus>().map_err(ServiceError::from)?,
        None => SourceStatus::PendingAnalysis,
    };
    let sources = state
        .registry
        .list_by_status(status, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(ApiResponse::ok(sources)))
}

/// 数据源详情
pub async fn get_source(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SourceDetail>>, AppError> {
    let detail = state.registry.get(id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// 激活数据源
pub async fn activate_source(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivateSourceRequestDto>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    payload.validate()?;
    let activation = state.registry.activate(id, payload.admin_notes).await?;
    Ok(Json(ApiResponse::with_message(
        json!({
            "source": activation.source,
            "config": activation.config,
            "task_id": activation.task.id,
            "scheduled_time": activation.task.scheduled_time,
        }),
        "source activated",
    )))
}

/// 拒绝数据源
pub async fn reject_source(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectSourceRequestDto>,
) -> Result<Json<ApiResponse<Source>>, AppError> {
    payload.validate()?;
    let source = state.registry.reject(id, payload.reason).await?;
    Ok(Json(ApiResponse::with_message(source, "source rejected")))
}

/// 删除数据源及其全部记录
pub async fn delete_source(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeleteSourceRequestDto>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    payload.validate()?;
    let removed = state.registry.delete(id, &payload.confirm_name).await?;
    Ok(Json(ApiResponse::with_message(
        json!({ "records_removed": removed }),
        "source deleted",
    )))
}

/// 重新触发分析
pub async fn analyze_source(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), AppError> {
    let signalled = state.registry.retry_analysis(id).await?;
    let message = if signalled {
        "analysis requested"
    } else {
        "analysis queue is busy; retry later"
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::with_message(
            json!({ "signalled": signalled }),
            message,
        )),
    ))
}

/// 手动触发抓取
pub async fn trigger_scrape(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManualScrapeRequestDto>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), AppError> {
    payload.validate()?;
    let task = state
        .registry
        .trigger_scrape(id, &payload.requested_by)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::with_message(task, "scrape scheduled")),
    ))
}
