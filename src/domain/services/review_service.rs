// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::{Activity, ActivityCandidate};
use crate::domain::models::admin_event::{
    AdminEvent, AdminEventStatus, EventOrigin, ExtractionSchema,
};
use crate::domain::models::source::{SourceStatus, SourceSubmission, SourceType};
use crate::domain::models::task::Priority;
use crate::domain::repositories::activity_repository::ActivityRepository;
use crate::domain::repositories::admin_event_repository::AdminEventRepository;
use crate::domain::repositories::store::RepositoryError;
use crate::domain::services::conversion_service::{ActivityConverter, ConversionOutcome};
use crate::domain::services::source_registry::SourceRegistry;
use crate::engines::error_policy::{default_class, ErrorClass};
use crate::engines::traits::{ClientProfile, ExtractionClient, ExtractionError, ExtractionRequest};
use crate::utils::errors::ServiceError;
use crate::utils::url_utils::{domain_of, origin_of, parse_http_url};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 管理员提交的抓取请求
#[derive(Debug, Clone)]
pub struct CrawlSubmission {
    pub url: String,
    pub schema_type: String,
    pub custom_schema: Option<Value>,
    pub extracted_by: String,
    pub admin_notes: Option<String>,
}

/// 审核事件与最新的转换预览
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedEvent {
    pub event: AdminEvent,
    pub conversion: ConversionOutcome,
}

/// 批准结果
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub event: AdminEvent,
    pub activity: Activity,
    /// 转换提示，不影响批准
    pub warnings: Vec<String>,
}

/// 引擎产出的一组候选记录
#[derive(Debug, Clone)]
pub struct CandidateBatch {
    pub source_id: Uuid,
    pub source_url: String,
    pub schema: ExtractionSchema,
    pub candidates: Vec<ActivityCandidate>,
}

/// 管理员审核流程
///
/// 原始提取结果以审核事件的形式保存，只有批准操作会写入已发布的活动
pub struct ReviewPipeline {
    events: Arc<dyn AdminEventRepository>,
    activities: Arc<dyn ActivityRepository>,
    registry: Arc<SourceRegistry>,
    client: Arc<dyn ExtractionClient>,
    converter: Arc<dyn ActivityConverter>,
    profile: ClientProfile,
    min_content_length: usize,
}

impl ReviewPipeline {
    pub fn new(
        events: Arc<dyn AdminEventRepository>,
        activities: Arc<dyn ActivityRepository>,
        registry: Arc<SourceRegistry>,
        client: Arc<dyn ExtractionClient>,
        converter: Arc<dyn ActivityConverter>,
        profile: ClientProfile,
        min_content_length: usize,
    ) -> Self {
        Self {
            events,
            activities,
            registry,
            client,
            converter,
            profile,
            min_content_length,
        }
    }

    async fn load(&self, id: Uuid) -> Result<AdminEvent, ServiceError> {
        self.events
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("admin event {}", id)))
    }

    /// 提交一次临时抓取
    ///
    /// URL已作为待审核/已批准事件或数据源存在时返回冲突，且不调用提取服务。
    /// 提取服务报告失败或内容过短时按提取错误返回，不保存事件也不登记数据源
    #[instrument(skip(self, submission), fields(url = %submission.url))]
    pub async fn submit_crawl(
        &self,
        submission: CrawlSubmission,
    ) -> Result<ReviewedEvent, ServiceError> {
        let url = parse_http_url(&submission.url)
            .ok_or_else(|| {
                ServiceError::Validation(format!("url is not a valid http(s) URL: {}", submission.url))
            })?
            .to_string();
        let schema =
            ExtractionSchema::from_type(&submission.schema_type, submission.custom_schema)?;

        let existing = self.events.find_by_url(&url).await?;
        if let Some(event) = existing
            .iter()
            .find(|e| e.status != AdminEventStatus::Rejected)
        {
            return Err(ServiceError::Conflict(format!(
                "url already has {} admin event {}",
                event.status, event.id
            )));
        }
        if let Some(source) = self.registry.find_by_url(&url).await? {
            return Err(ServiceError::Conflict(format!(
                "url is already registered as source {}",
                source.id
            )));
        }

        let request = ExtractionRequest {
            url: url.clone(),
            schema: schema.clone(),
            profile: self.profile.clone(),
        };
        let response = self
            .client
            .extract(&request)
            .await
            .and_then(|response| response.validated(self.min_content_length))
            .map_err(extraction_failure)?;

        let mut event = AdminEvent::new(
            url.clone(),
            schema,
            response.raw_structured_data,
            submission.extracted_by.clone(),
            EventOrigin::AdminCrawl,
        );
        event.events_count = response.events_count;
        event.credits_used = response.credits_used;
        event.processing_time_ms = response.processing_time_ms;
        event.admin_notes = submission.admin_notes;
        event.source_id = self
            .ensure_source(&url, &event.schema, &submission.extracted_by)
            .await;

        let conversion = self.converter.convert(&event).await;
        apply_preview(&mut event, &conversion);
        let event = self.events.create(&event).await?;
        counter!("admin_events_total", "status" => "pending").increment(1);
        info!(
            "Admin crawl {} stored as event {} ({} record(s))",
            url, event.id, event.events_count
        );
        Ok(ReviewedEvent { event, conversion })
    }

    /// 为URL的域名创建或激活数据源，失败只记录日志
    async fn ensure_source(
        &self,
        url: &str,
        schema: &ExtractionSchema,
        submitted_by: &str,
    ) -> Option<Uuid> {
        let domain = domain_of(url)?;
        let existing = match self.registry.find_by_domain(&domain).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Could not look up sources for {}: {}", domain, e);
                return None;
            }
        };

        if let Some(source) = existing.first() {
            if source.status == SourceStatus::AnalysisComplete {
                if let Err(e) = self.registry.activate(source.id, None).await {
                    warn!("Could not activate source {} for {}: {}", source.id, domain, e);
                }
            }
            return Some(source.id);
        }

        let submission = SourceSubmission {
            name: domain.clone(),
            base_url: origin_of(url)?,
            source_type: source_type_for(schema),
            priority: Priority::Medium,
            expected_content: vec![schema.name().to_string()],
            hint_urls: vec![url.to_string()],
            submitted_by: submitted_by.to_string(),
        };
        match self.registry.submit(submission).await {
            Ok(source) => Some(source.id),
            Err(e) => {
                warn!("Could not register source for {}: {}", domain, e);
                None
            }
        }
    }

    /// 转换审核事件
    pub async fn convert(&self, event: &AdminEvent) -> ConversionOutcome {
        self.converter.convert(event).await
    }

    /// 审核事件详情，附带重新运行的转换结果
    pub async fn get_event(&self, id: Uuid) -> Result<ReviewedEvent, ServiceError> {
        let event = self.load(id).await?;
        let conversion = self.converter.convert(&event).await;
        Ok(ReviewedEvent { event, conversion })
    }

    /// 按状态列出审核事件
    pub async fn list_events(
        &self,
        status: AdminEventStatus,
        limit: usize,
    ) -> Result<Vec<AdminEvent>, ServiceError> {
        Ok(self.events.list_by_status(status, limit).await?)
    }

    /// 批准审核事件
    ///
    /// 重新转换后写入活动；活动写入成功之后才更新事件状态
    #[instrument(skip(self, notes))]
    pub async fn approve(
        &self,
        id: Uuid,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<Approval, ServiceError> {
        let mut event = self.load(id).await?;
        if !event.status.is_reviewable() {
            return Err(ServiceError::Conflict(format!(
                "admin event {} is {} and cannot be approved",
                id, event.status
            )));
        }

        let conversion = self.converter.convert(&event).await;
        let Some(mut activity) = conversion.activity.clone() else {
            return Err(ServiceError::Conversion(conversion.issues));
        };
        activity.admin_event_id = Some(event.id);
        activity.approved_by = Some(reviewer.to_string());

        let activity = match self.activities.create(&activity).await {
            Ok(activity) => activity,
            Err(RepositoryError::AlreadyExists) => {
                return Err(ServiceError::Conflict(format!(
                    "an activity with key '{}' is already published",
                    activity.dedup_key()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        event.approve(reviewer, notes, activity.id)?;
        apply_preview(&mut event, &conversion);
        let event = match self.events.update(&event).await {
            Ok(event) => event,
            Err(e) => {
                // 事件仍可审核，撤回刚写入的活动
                if let Err(rollback) = self.activities.delete(activity.id).await {
                    warn!(
                        "Failed to roll back activity {} after event update error: {}",
                        activity.id, rollback
                    );
                }
                return Err(e.into());
            }
        };

        counter!("admin_events_total", "status" => "approved").increment(1);
        info!("Admin event {} approved by {} as activity {}", id, reviewer, activity.id);
        Ok(Approval {
            event,
            activity,
            warnings: conversion.issues,
        })
    }

    /// 拒绝审核事件，无论转换结果如何都允许
    #[instrument(skip(self, reason))]
    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: &str,
        reason: Option<String>,
    ) -> Result<AdminEvent, ServiceError> {
        let mut event = self.load(id).await?;
        event.reject(reviewer, reason)?;
        let event = self.events.update(&event).await?;
        counter!("admin_events_total", "status" => "rejected").increment(1);
        info!("Admin event {} rejected by {}", id, reviewer);
        Ok(event)
    }

    /// 编辑原始数据并刷新转换预览
    #[instrument(skip(self, raw_data, notes))]
    pub async fn edit(
        &self,
        id: Uuid,
        raw_data: Value,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<ReviewedEvent, ServiceError> {
        let mut event = self.load(id).await?;
        event.edit(raw_data, reviewer, notes)?;
        let conversion = self.converter.convert(&event).await;
        apply_preview(&mut event, &conversion);
        let event = self.events.update(&event).await?;
        counter!("admin_events_total", "status" => "edited").increment(1);
        Ok(ReviewedEvent { event, conversion })
    }

    /// 把引擎产出的候选记录逐条保存为待审核事件
    ///
    /// 去重键已有未被拒绝的事件时跳过该记录
    ///
    /// # 返回值
    ///
    /// 创建的事件数；单条写入失败只记录日志
    pub async fn ingest_candidates(&self, batch: CandidateBatch) -> usize {
        let mut created = 0;
        let mut skipped = 0;
        for candidate in batch.candidates {
            if self.awaiting_review(&candidate).await {
                skipped += 1;
                continue;
            }
            let mut event = AdminEvent::new(
                batch.source_url.clone(),
                batch.schema.clone(),
                candidate.0,
                "engine",
                EventOrigin::Engine,
            );
            event.source_id = Some(batch.source_id);
            event.events_count = 1;
            let conversion = self.converter.convert(&event).await;
            apply_preview(&mut event, &conversion);
            match self.events.create(&event).await {
                Ok(_) => created += 1,
                Err(e) => warn!(
                    "Failed to store engine candidate for source {}: {}",
                    batch.source_id, e
                ),
            }
        }
        if skipped > 0 {
            debug!(
                "Skipped {} candidate(s) from source {} already under review",
                skipped, batch.source_id
            );
        }
        if created > 0 {
            counter!("admin_events_total", "status" => "pending").increment(created as u64);
        }
        created
    }

    /// 同一去重键是否已有待审核、已编辑或已批准的事件
    async fn awaiting_review(&self, candidate: &ActivityCandidate) -> bool {
        match self.events.find_by_dedup_key(&candidate.dedup_key()).await {
            Ok(existing) => existing
                .iter()
                .any(|e| e.status != AdminEventStatus::Rejected),
            Err(e) => {
                warn!("Could not check review queue, keeping candidate: {}", e);
                false
            }
        }
    }
}

fn apply_preview(event: &mut AdminEvent, conversion: &ConversionOutcome) {
    event.conversion_preview = conversion.activity.clone();
    event.conversion_issues = conversion.issues.clone();
    event.confidence_score = conversion.confidence_score;
}

fn source_type_for(schema: &ExtractionSchema) -> SourceType {
    match schema {
        ExtractionSchema::Venue => SourceType::Venue,
        ExtractionSchema::Class | ExtractionSchema::Camp => SourceType::ActivityProvider,
        ExtractionSchema::Event | ExtractionSchema::Custom { .. } => SourceType::EventCalendar,
    }
}

/// 提取失败映射为服务错误
pub fn extraction_failure(err: ExtractionError) -> ServiceError {
    match default_class(&err) {
        ErrorClass::Retryable => ServiceError::TransientExtraction(err.to_string()),
        ErrorClass::Terminal => ServiceError::TerminalExtraction(err.to_string()),
    }
}

#[cfg(test)]
#[path = "review_service_test.rs"]
mod review_service_test;
