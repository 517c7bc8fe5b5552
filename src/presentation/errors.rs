// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::ValidationErrors;

use crate::utils::errors::{ErrorKind, ServiceError};

/// 应用错误类型
///
/// 封装处理器中可能出现的错误，统一转换为 `{success:false, error:{kind, message}}`
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// 错误种类与HTTP状态码
    fn classify(&self) -> (ErrorKind, StatusCode) {
        if let Some(err) = self.0.downcast_ref::<ServiceError>() {
            let kind = err.kind();
            return (kind, status_for(kind));
        }
        if self.0.downcast_ref::<ValidationErrors>().is_some() {
            return (ErrorKind::Validation, StatusCode::BAD_REQUEST);
        }
        (ErrorKind::Persistence, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// 错误种类对应的HTTP状态码
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Conversion => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransientExtraction => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::TerminalExtraction => StatusCode::BAD_GATEWAY,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 构造错误信封
pub fn error_envelope(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let body = Json(json!({
        "success": false,
        "error": { "kind": kind, "message": message.into() }
    }));
    (status, body).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (kind, status) = self.classify();
        let message = match self.0.downcast_ref::<ValidationErrors>() {
            Some(errors) => format!("Validation error: {}", errors),
            None => self.0.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", kind, message);
        }
        error_envelope(status, &kind.to_string(), message)
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
