// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 领域错误类型
///
/// 表示在领域层可能发生的各种错误情况，包括状态转换错误和验证失败。
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换，当实体状态转换不符合业务规则时发生
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 记录已经完成，不可再修改
    #[error("Record is already finalized")]
    AlreadyFinalized,
}

impl DomainError {
    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        DomainError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
