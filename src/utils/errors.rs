// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error::DomainError;
use crate::domain::repositories::store::RepositoryError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 服务层错误类型
///
/// 覆盖所有对外暴露的失败情形。校验错误在任何副作用之前返回；
/// 持久化错误只会让当前操作失败，不会留下半完成的状态。
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 输入缺失或格式错误
    #[error("Validation error: {0}")]
    Validation(String),

    /// 未知的数据源、事件或分析记录
    #[error("Not found: {0}")]
    NotFound(String),

    /// 重复的URL/数据源，或非法的状态转换
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 可重试的提取错误（重试耗尽后才会出现在这里）
    #[error("Transient extraction error: {0}")]
    TransientExtraction(String),

    /// 不可重试的提取错误
    #[error("Terminal extraction error: {0}")]
    TerminalExtraction(String),

    /// 转换失败，附带问题列表
    #[error("Conversion error: {}", .0.join("; "))]
    Conversion(Vec<String>),

    /// 存储读写失败
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

/// 错误种类，用于API响应信封
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    TransientExtraction,
    TerminalExtraction,
    Conversion,
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransientExtraction => "transient_extraction",
            ErrorKind::TerminalExtraction => "terminal_extraction",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Persistence => "persistence",
        };
        write!(f, "{}", name)
    }
}

impl ServiceError {
    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::TransientExtraction(_) => ErrorKind::TransientExtraction,
            ServiceError::TerminalExtraction(_) => ErrorKind::TerminalExtraction,
            ServiceError::Conversion(_) => ErrorKind::Conversion,
            ServiceError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => ServiceError::Validation(msg),
            DomainError::InvalidStateTransition { .. } | DomainError::AlreadyFinalized => {
                ServiceError::Conflict(err.to_string())
            }
        }
    }
}

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(#[from] RepositoryError),

    #[error("服务错误: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("内部错误: {0}")]
    InternalError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_mapping() {
        let err: ServiceError = DomainError::ValidationError("name is required".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: ServiceError = DomainError::AlreadyFinalized.into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_conversion_error_message_joins_issues() {
        let err = ServiceError::Conversion(vec!["missing title".into(), "bad date".into()]);
        assert_eq!(err.to_string(), "Conversion error: missing title; bad date");
        assert_eq!(err.kind().to_string(), "conversion");
    }
}
