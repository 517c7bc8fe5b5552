// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source::{
    Source, SourceAnalysis, SourceConfig, SourceConfigDefaults, SourceStatus, SourceSubmission,
};
use crate::domain::models::task::{Priority, Task, TaskType};
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::store::RepositoryError;
use crate::domain::services::source_analyzer::AnalysisQueue;
use crate::queue::scheduler::TaskScheduler;
use crate::utils::errors::ServiceError;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 数据源详情
#[derive(Debug, Clone, Serialize)]
pub struct SourceDetail {
    pub source: Source,
    pub analysis: Option<SourceAnalysis>,
    pub config: Option<SourceConfig>,
}

/// 激活结果
#[derive(Debug, Clone)]
pub struct Activation {
    pub source: Source,
    pub config: SourceConfig,
    /// 激活后立即调度的完整抓取任务
    pub task: Task,
}

/// 数据源注册表
///
/// 负责数据源生命周期状态机：
/// `pending_analysis → analyzing → analysis_complete → {active | rejected}`
pub struct SourceRegistry {
    sources: Arc<dyn SourceRepository>,
    scheduler: Arc<TaskScheduler>,
    analysis: AnalysisQueue,
    defaults: SourceConfigDefaults,
}

impl SourceRegistry {
    /// 创建注册表
    ///
    /// # 参数
    ///
    /// * `sources` - 数据源仓库
    /// * `scheduler` - 任务调度器，激活时创建首个任务
    /// * `analysis` - 分析信号发送端
    /// * `defaults` - 生成抓取配置时的默认值
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        scheduler: Arc<TaskScheduler>,
        analysis: AnalysisQueue,
        defaults: SourceConfigDefaults,
    ) -> Self {
        Self {
            sources,
            scheduler,
            analysis,
            defaults,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Source, ServiceError> {
        self.sources
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("source {}", id)))
    }

    /// 提交新的数据源
    ///
    /// 校验通过后以 `pending_analysis` 状态保存，并通知分析器。
    /// 通知失败不会让提交失败，之后可以手动重试分析
    #[instrument(skip(self, submission), fields(name = %submission.name))]
    pub async fn submit(&self, submission: SourceSubmission) -> Result<Source, ServiceError> {
        submission.validate()?;
        if let Some(existing) = self.sources.find_by_url(&submission.base_url).await? {
            return Err(ServiceError::Conflict(format!(
                "base_url {} is already registered as source {}",
                submission.base_url, existing.id
            )));
        }

        let source = self.sources.create(&Source::new(submission)).await?;
        counter!("sources_submitted_total").increment(1);
        info!(
            "Source {} ({}) submitted by {}",
            source.id,
            source.name(),
            source.submission.submitted_by
        );
        self.analysis.signal(source.id);
        Ok(source)
    }

    /// 按状态列出数据源
    pub async fn list_by_status(
        &self,
        status: SourceStatus,
        limit: usize,
    ) -> Result<Vec<Source>, ServiceError> {
        Ok(self.sources.list_by_status(status, limit).await?)
    }

    /// 数据源详情：提交信息、分析结果和抓取配置
    pub async fn get(&self, id: Uuid) -> Result<SourceDetail, ServiceError> {
        let source = self.load(id).await?;
        let analysis = self.sources.find_analysis(id).await?;
        let config = self.sources.find_config(id).await?;
        Ok(SourceDetail {
            source,
            analysis,
            config,
        })
    }

    /// 根据URL查找数据源
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Source>, ServiceError> {
        Ok(self.sources.find_by_url(url).await?)
    }

    /// 根据域名查找数据源
    pub async fn find_by_domain(&self, domain: &str) -> Result<Vec<Source>, ServiceError> {
        Ok(self.sources.find_by_domain(domain).await?)
    }

    /// 激活数据源
    ///
    /// 要求分析已完成；生成抓取配置、切换到 `active`，并调度一个立即执行的高优先级完整抓取任务。
    /// 已激活的数据源再次激活会被拒绝且没有副作用
    #[instrument(skip(self, admin_notes))]
    pub async fn activate(
        &self,
        id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<Activation, ServiceError> {
        let mut source = self.load(id).await?;
        if source.status == SourceStatus::Active {
            return Err(ServiceError::Conflict(format!(
                "source {} is already active",
                id
            )));
        }
        if source.status != SourceStatus::AnalysisComplete {
            return Err(ServiceError::Conflict(format!(
                "source {} cannot be activated from status {}",
                id, source.status
            )));
        }
        let analysis = match self.sources.find_analysis(id).await? {
            Some(analysis) if analysis.is_complete() => analysis,
            Some(_) => {
                return Err(ServiceError::Conflict(format!(
                    "analysis for source {} did not complete",
                    id
                )))
            }
            None => {
                return Err(ServiceError::Conflict(format!(
                    "source {} has no analysis",
                    id
                )))
            }
        };

        let config =
            SourceConfig::from_analysis(&source, &analysis, &self.defaults, admin_notes.clone());
        match self.sources.create_config(&config).await {
            Ok(()) => {}
            // 上一次激活写入了配置但没有完成状态切换
            Err(RepositoryError::AlreadyExists) => self.sources.update_config(&config).await?,
            Err(e) => return Err(e.into()),
        }

        // 首个任务先于状态切换写入，调度失败时数据源仍可重新激活
        let scheduled = self
            .scheduler
            .schedule(id, TaskType::FullScrape, Priority::High)
            .await
            .map_err(|e| {
                error!("Could not schedule initial task for source {}: {}", id, e);
                e
            })?;

        source.transition(SourceStatus::Active)?;
        if admin_notes.is_some() {
            source.admin_notes = admin_notes;
        }
        let source = self.sources.update(&source).await?;
        counter!("sources_activated_total").increment(1);

        info!(
            "Source {} activated; initial task {} scheduled",
            id, scheduled.task.id
        );

        Ok(Activation {
            source,
            config,
            task: scheduled.task,
        })
    }

    /// 拒绝数据源
    ///
    /// 终止状态，不会创建配置；已激活的数据源会停用其配置
    #[instrument(skip(self, reason))]
    pub async fn reject(&self, id: Uuid, reason: Option<String>) -> Result<Source, ServiceError> {
        let mut source = self.load(id).await?;
        if source.status == SourceStatus::Rejected {
            return Ok(source);
        }
        let was_active = source.status == SourceStatus::Active;
        source.transition(SourceStatus::Rejected)?;
        if reason.is_some() {
            source.admin_notes = reason;
        }
        let source = self.sources.update(&source).await?;

        if was_active {
            if let Some(mut config) = self.sources.find_config(id).await? {
                config.enabled = false;
                config.updated_at = chrono::Utc::now();
                self.sources.update_config(&config).await?;
            }
        }
        info!("Source {} rejected", id);
        Ok(source)
    }

    /// 删除数据源
    ///
    /// 调用方必须提供与当前名称完全一致的确认名
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, confirm_name: &str) -> Result<u64, ServiceError> {
        let source = self.load(id).await?;
        if confirm_name != source.name() {
            return Err(ServiceError::Validation(
                "confirmation name does not match the source name".to_string(),
            ));
        }
        let removed = self.sources.delete_all(id).await?;
        warn!("Source {} ({}) deleted, {} record(s) removed", id, source.name(), removed);
        Ok(removed)
    }

    /// 手动触发抓取，只对已激活的数据源有效
    pub async fn trigger_scrape(
        &self,
        id: Uuid,
        requested_by: &str,
    ) -> Result<Task, ServiceError> {
        let source = self.load(id).await?;
        if source.status != SourceStatus::Active {
            return Err(ServiceError::Conflict(format!(
                "source {} is {}; only active sources can be scraped",
                id, source.status
            )));
        }
        let scheduled = self.scheduler.trigger_manual(id, requested_by).await?;
        Ok(scheduled.task)
    }

    /// 手动重新触发分析
    pub async fn retry_analysis(&self, id: Uuid) -> Result<bool, ServiceError> {
        let source = self.load(id).await?;
        if !matches!(
            source.status,
            SourceStatus::PendingAnalysis | SourceStatus::Analyzing
        ) {
            return Err(ServiceError::Conflict(format!(
                "source {} is {} and cannot be re-analyzed",
                id, source.status
            )));
        }
        Ok(self.analysis.signal(id))
    }

    /// 分析开始：`pending_analysis → analyzing`
    ///
    /// 已在分析中的数据源保持原状态，其他状态返回 `None`
    pub async fn begin_analysis(&self, id: Uuid) -> Result<Option<Source>, ServiceError> {
        let mut source = self.load(id).await?;
        match source.status {
            SourceStatus::PendingAnalysis | SourceStatus::Analyzing => {
                source.transition(SourceStatus::Analyzing)?;
                Ok(Some(self.sources.update(&source).await?))
            }
            other => {
                info!("Skipping analysis of source {} in status {}", id, other);
                Ok(None)
            }
        }
    }

    /// 保存分析结果
    ///
    /// 成功时切换到 `analysis_complete`；失败时保持 `analyzing` 以便重试
    pub async fn record_analysis(&self, analysis: SourceAnalysis) -> Result<Source, ServiceError> {
        let mut source = self.load(analysis.source_id).await?;
        self.sources.save_analysis(&analysis).await?;
        if analysis.is_complete() && source.status == SourceStatus::Analyzing {
            source.transition(SourceStatus::AnalysisComplete)?;
            source = self.sources.update(&source).await?;
            info!(
                "Analysis of source {} complete (quality {:.2})",
                source.id, analysis.quality_score
            );
        } else if let Some(error) = &analysis.error {
            warn!("Analysis of source {} failed: {}", source.id, error);
        }
        Ok(source)
    }

    /// 启用的抓取配置
    pub async fn enabled_configs(&self) -> Result<Vec<SourceConfig>, ServiceError> {
        Ok(self.sources.list_enabled_configs().await?)
    }

    /// 查找抓取配置
    pub async fn find_config(&self, id: Uuid) -> Result<Option<SourceConfig>, ServiceError> {
        Ok(self.sources.find_config(id).await?)
    }

    /// 回写抓取配置（可靠性、频率、内容指纹）
    pub async fn update_config(&self, config: &SourceConfig) -> Result<(), ServiceError> {
        Ok(self.sources.update_config(config).await?)
    }
}

#[cfg(test)]
#[path = "source_registry_test.rs"]
mod source_registry_test;
