// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::review_service::{CrawlSubmission, ReviewedEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

fn default_schema_type() -> String {
    "event".to_string()
}

/// 管理员抓取请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CrawlRequestDto {
    #[validate(url)]
    pub url: String,
    /// `event`、`class`、`camp`、`venue` 或 `custom`
    #[serde(default = "default_schema_type")]
    pub schema_type: String,
    pub custom_schema: Option<Value>,
    #[validate(length(min = 1))]
    pub extracted_by_user: String,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

impl From<CrawlRequestDto> for CrawlSubmission {
    fn from(dto: CrawlRequestDto) -> Self {
        CrawlSubmission {
            url: dto.url.trim().to_string(),
            schema_type: dto.schema_type,
            custom_schema: dto.custom_schema,
            extracted_by: dto.extracted_by_user,
            admin_notes: dto.admin_notes,
        }
    }
}

/// 管理员抓取响应DTO
#[derive(Debug, Deserialize, Serialize)]
pub struct CrawlResponseDto {
    pub event_id: Uuid,
    pub events_count: u32,
    pub credits_used: u64,
    /// 毫秒
    pub processing_time: u64,
    pub confidence_score: f64,
    pub conversion_issues: Vec<String>,
}

impl From<&ReviewedEvent> for CrawlResponseDto {
    fn from(reviewed: &ReviewedEvent) -> Self {
        CrawlResponseDto {
            event_id: reviewed.event.id,
            events_count: reviewed.event.events_count,
            credits_used: reviewed.event.credits_used,
            processing_time: reviewed.event.processing_time_ms,
            confidence_score: reviewed.conversion.confidence_score,
            conversion_issues: reviewed.conversion.issues.clone(),
        }
    }
}

/// 批准请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ApproveEventRequestDto {
    #[validate(length(min = 1))]
    pub reviewer: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// 拒绝请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RejectEventRequestDto {
    #[validate(length(min = 1))]
    pub reviewer: String,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// 编辑请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct EditEventRequestDto {
    pub raw_data: Value,
    #[validate(length(min = 1))]
    pub reviewer: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// 审核事件列表查询参数
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct EventListQueryDto {
    /// 默认 `pending`
    pub status: Option<String>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}
