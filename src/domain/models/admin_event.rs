// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::{Activity, ActivityCandidate, ActivityKind};
use crate::domain::models::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 审核状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdminEventStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Edited,
}

impl AdminEventStatus {
    /// 是否仍在等待审核
    pub fn is_reviewable(self) -> bool {
        matches!(self, AdminEventStatus::Pending | AdminEventStatus::Edited)
    }
}

impl fmt::Display for AdminEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AdminEventStatus::Pending => write!(f, "pending"),
            AdminEventStatus::Approved => write!(f, "approved"),
            AdminEventStatus::Rejected => write!(f, "rejected"),
            AdminEventStatus::Edited => write!(f, "edited"),
        }
    }
}

impl FromStr for AdminEventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AdminEventStatus::Pending),
            "approved" => Ok(AdminEventStatus::Approved),
            "rejected" => Ok(AdminEventStatus::Rejected),
            "edited" => Ok(AdminEventStatus::Edited),
            other => Err(DomainError::ValidationError(format!(
                "unknown admin event status: {}",
                other
            ))),
        }
    }
}

/// 提取模式
///
/// 已知模式之外的管理员自定义模式以不透明文档的形式携带。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionSchema {
    Event,
    Class,
    Camp,
    Venue,
    Custom { document: Value },
}

impl ExtractionSchema {
    /// 由请求中的 `schema_type` 构造
    ///
    /// # 参数
    ///
    /// * `schema_type` - `event`、`class`、`camp`、`venue` 或 `custom`
    /// * `custom` - `custom` 模式必须提供的模式文档
    pub fn from_type(schema_type: &str, custom: Option<Value>) -> Result<Self, DomainError> {
        match schema_type.trim().to_lowercase().as_str() {
            "event" | "events" => Ok(ExtractionSchema::Event),
            "class" | "classes" => Ok(ExtractionSchema::Class),
            "camp" | "camps" => Ok(ExtractionSchema::Camp),
            "venue" | "venues" => Ok(ExtractionSchema::Venue),
            "custom" => match custom {
                Some(document) if document.is_object() => Ok(ExtractionSchema::Custom { document }),
                _ => Err(DomainError::ValidationError(
                    "custom_schema must be a JSON object when schema_type is custom".to_string(),
                )),
            },
            other => Err(DomainError::ValidationError(format!(
                "unknown schema_type: {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionSchema::Event => "event",
            ExtractionSchema::Class => "class",
            ExtractionSchema::Camp => "camp",
            ExtractionSchema::Venue => "venue",
            ExtractionSchema::Custom { .. } => "custom",
        }
    }

    /// 该模式转换出的活动种类
    pub fn activity_kind(&self) -> ActivityKind {
        match self {
            ExtractionSchema::Event => ActivityKind::Event,
            ExtractionSchema::Class => ActivityKind::Class,
            ExtractionSchema::Camp => ActivityKind::Camp,
            ExtractionSchema::Venue => ActivityKind::Venue,
            ExtractionSchema::Custom { document } => document
                .get("activity_kind")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or(ActivityKind::Program),
        }
    }
}

/// 事件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// 管理员手动提交的抓取
    #[default]
    AdminCrawl,
    /// 执行引擎批次产出
    Engine,
}

/// 审核历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAction {
    pub action: String,
    pub reviewer: String,
    pub notes: Option<String>,
    /// 编辑前的原始数据
    pub previous_raw_data: Option<Value>,
    pub at: DateTime<Utc>,
}

/// 待审核的原始提取记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminEvent {
    pub id: Uuid,
    pub source_url: String,
    pub schema: ExtractionSchema,
    pub raw_data: Value,
    /// 转换预览，可能为空
    pub conversion_preview: Option<Activity>,
    pub conversion_issues: Vec<String>,
    pub confidence_score: f64,
    pub status: AdminEventStatus,
    pub extracted_by: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub activity_id: Option<Uuid>,
    pub events_count: u32,
    pub credits_used: u64,
    pub processing_time_ms: u64,
    pub source_id: Option<Uuid>,
    pub origin: EventOrigin,
    pub history: Vec<ReviewAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminEvent {
    pub fn new(
        source_url: impl Into<String>,
        schema: ExtractionSchema,
        raw_data: Value,
        extracted_by: impl Into<String>,
        origin: EventOrigin,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.into(),
            schema,
            raw_data,
            conversion_preview: None,
            conversion_issues: Vec::new(),
            confidence_score: 0.0,
            status: AdminEventStatus::Pending,
            extracted_by: extracted_by.into(),
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            activity_id: None,
            events_count: 0,
            credits_used: 0,
            processing_time_ms: 0,
            source_id: None,
            origin,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn record(&mut self, action: &str, reviewer: &str, notes: Option<String>, previous: Option<Value>) {
        let now = Utc::now();
        self.history.push(ReviewAction {
            action: action.to_string(),
            reviewer: reviewer.to_string(),
            notes,
            previous_raw_data: previous,
            at: now,
        });
        self.updated_at = now;
    }

    /// 标记为已批准：Pending/Edited → Approved
    ///
    /// 只应在活动写入成功之后调用。
    pub fn approve(
        &mut self,
        reviewer: &str,
        notes: Option<String>,
        activity_id: Uuid,
    ) -> Result<(), DomainError> {
        if !self.status.is_reviewable() {
            return Err(DomainError::transition(self.status, AdminEventStatus::Approved));
        }
        self.status = AdminEventStatus::Approved;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(Utc::now());
        self.activity_id = Some(activity_id);
        if notes.is_some() {
            self.admin_notes = notes.clone();
        }
        self.record("approve", reviewer, notes, None);
        Ok(())
    }

    /// 拒绝：任何未终结的事件都可以拒绝
    pub fn reject(&mut self, reviewer: &str, reason: Option<String>) -> Result<(), DomainError> {
        if !self.status.is_reviewable() {
            return Err(DomainError::transition(self.status, AdminEventStatus::Rejected));
        }
        self.status = AdminEventStatus::Rejected;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(Utc::now());
        if reason.is_some() {
            self.admin_notes = reason.clone();
        }
        self.record("reject", reviewer, reason, None);
        Ok(())
    }

    /// 原始数据对应的去重键，没有标题时为空
    pub fn dedup_key(&self) -> Option<String> {
        let candidate = ActivityCandidate(self.raw_data.clone());
        candidate.title()?;
        Some(candidate.dedup_key())
    }

    /// 替换原始数据，保留历史
    pub fn edit(
        &mut self,
        raw_data: Value,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.status.is_reviewable() {
            return Err(DomainError::transition(self.status, AdminEventStatus::Edited));
        }
        let previous = std::mem::replace(&mut self.raw_data, raw_data);
        self.status = AdminEventStatus::Edited;
        if notes.is_some() {
            self.admin_notes = notes.clone();
        }
        self.record("edit", reviewer, notes, Some(previous));
        Ok(())
    }
}
