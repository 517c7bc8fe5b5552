// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source::{SourceSubmission, SourceType};
use crate::domain::models::task::Priority;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 数据源提交请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SubmitSourceRequestDto {
    #[validate(length(min = 1, max = 200))]
    pub source_name: String,
    #[validate(url)]
    pub base_url: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub expected_content: Vec<String>,
    /// 提示页面，逐条校验在领域层完成
    #[serde(default)]
    pub hint_urls: Vec<String>,
    #[validate(length(min = 1))]
    pub submitted_by: String,
}

impl From<SubmitSourceRequestDto> for SourceSubmission {
    fn from(dto: SubmitSourceRequestDto) -> Self {
        SourceSubmission {
            name: dto.source_name.trim().to_string(),
            base_url: dto.base_url.trim().to_string(),
            source_type: dto.source_type,
            priority: dto.priority,
            expected_content: dto.expected_content,
            hint_urls: dto.hint_urls,
            submitted_by: dto.submitted_by,
        }
    }
}

/// 数据源提交响应DTO
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitSourceResponseDto {
    pub source_id: Uuid,
}

/// 激活数据源请求DTO
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct ActivateSourceRequestDto {
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

/// 拒绝数据源请求DTO
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct RejectSourceRequestDto {
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// 删除数据源请求DTO
///
/// `confirm_name` 必须与数据源名称完全一致
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct DeleteSourceRequestDto {
    #[validate(length(min = 1))]
    pub confirm_name: String,
}

/// 手动触发抓取请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ManualScrapeRequestDto {
    #[validate(length(min = 1))]
    pub requested_by: String,
}

/// 数据源列表查询参数
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct SourceListQueryDto {
    /// 默认 `pending_analysis`
    pub status: Option<String>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}
