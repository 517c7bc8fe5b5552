// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::response::ApiResponse;
use crate::application::state::AppState;
use crate::engines::task_runner::TaskRunSummary;
use crate::presentation::errors::AppError;
use axum::{extract::Extension, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// 立即运行所有到期任务并返回批次汇总
pub async fn run_batch(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<TaskRunSummary>>, AppError> {
    info!("Batch run requested through the API");
    let summary = state.runner.run_due(Utc::now()).await?;
    let message = format!(
        "{} task(s) run, {} succeeded, {} failed",
        summary.tasks_started, summary.tasks_completed, summary.tasks_failed
    );
    Ok(Json(ApiResponse::with_message(summary, message)))
}
