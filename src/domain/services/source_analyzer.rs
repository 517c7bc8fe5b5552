// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::activity::{candidates_from_payload, ActivityCandidate};
use crate::domain::models::admin_event::ExtractionSchema;
use crate::domain::models::source::{Source, SourceAnalysis, SourceType};
use crate::domain::services::quality_scorer::QualityScorer;
use crate::engines::traits::{ClientProfile, ExtractionClient, ExtractionRequest};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 单次分析最多抽样的页面数
const MAX_SAMPLED_URLS: usize = 5;

/// 分析信号的发送端
///
/// 发送是即发即忘的：通道已满或已关闭只记录日志，不影响调用方
#[derive(Debug, Clone)]
pub struct AnalysisQueue {
    tx: mpsc::Sender<Uuid>,
}

impl AnalysisQueue {
    /// 创建分析信号通道
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Uuid>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 通知分析器处理数据源，返回信号是否送达
    pub fn signal(&self, source_id: Uuid) -> bool {
        match self.tx.try_send(source_id) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Could not signal analysis for source {}: {}; retry it manually",
                    source_id, e
                );
                false
            }
        }
    }
}

/// 数据源类型对应的默认提取模式
pub fn schema_for(source_type: SourceType) -> ExtractionSchema {
    match source_type {
        SourceType::Venue | SourceType::Directory => ExtractionSchema::Venue,
        SourceType::EventCalendar | SourceType::Municipal => ExtractionSchema::Event,
        SourceType::ActivityProvider => ExtractionSchema::Class,
    }
}

/// 数据源分析器
///
/// 对提示页面调用提取服务，给出选择器、目标页面、质量分数和建议频率
pub struct SourceAnalyzer {
    client: Arc<dyn ExtractionClient>,
    scorer: QualityScorer,
    profile: ClientProfile,
    scheduler: SchedulerSettings,
}

impl SourceAnalyzer {
    /// 创建分析器
    ///
    /// # 参数
    ///
    /// * `client` - 提取服务客户端
    /// * `scorer` - 质量评分器
    /// * `profile` - 请求使用的客户端参数
    /// * `scheduler` - 用于推导建议频率的调度器配置
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        scorer: QualityScorer,
        profile: ClientProfile,
        scheduler: SchedulerSettings,
    ) -> Self {
        Self {
            client,
            scorer,
            profile,
            scheduler,
        }
    }

    /// 分析数据源
    ///
    /// 所有抽样页面都失败时返回带 `error` 的分析记录
    pub async fn analyze(&self, source: &Source) -> SourceAnalysis {
        let urls = sample_urls(source);
        let schema = schema_for(source.submission.source_type);
        info!(
            "Analyzing source {} ({}) over {} page(s)",
            source.id,
            source.name(),
            urls.len()
        );

        let mut candidates: Vec<ActivityCandidate> = Vec::new();
        let mut selectors = BTreeMap::new();
        let mut target_urls = Vec::new();
        let mut issues = Vec::new();
        let mut failures = Vec::new();

        for url in &urls {
            let request = ExtractionRequest {
                url: url.clone(),
                schema: schema.clone(),
                profile: self.profile.clone(),
            };
            match self.client.extract(&request).await {
                Ok(response) => {
                    let found = candidates_from_payload(&response.raw_structured_data);
                    debug!("Sampled {}: {} candidate(s)", url, found.len());
                    if found.is_empty() {
                        issues.push(format!("no activities found on {}", url));
                    } else {
                        target_urls.push(url.clone());
                    }
                    if let Some(found_selectors) = response.selectors {
                        for (field, selector) in found_selectors {
                            selectors.entry(field).or_insert(selector);
                        }
                    }
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!("Analysis sample {} failed: {}", url, e);
                    failures.push(format!("{}: {}", url, e));
                }
            }
        }

        if failures.len() == urls.len() {
            return SourceAnalysis::failed(
                source.id,
                format!("all sampled pages failed: {}", failures.join("; ")),
            );
        }
        issues.extend(failures);

        let quality_score = self.scorer.average(&candidates);
        SourceAnalysis {
            source_id: source.id,
            selectors,
            target_urls,
            quality_score,
            recommended_frequency_hours: self.recommend_frequency(candidates.len()),
            sampled_urls: urls.len(),
            activities_sampled: candidates.len(),
            issues,
            error: None,
            analyzed_at: Utc::now(),
        }
    }

    /// 活动越多的数据源更新越频繁，建议更短的间隔
    fn recommend_frequency(&self, activities: usize) -> u32 {
        let base = self.scheduler.default_frequency_hours;
        let hours = match activities {
            n if n >= 20 => base / 2,
            n if n >= 5 => base,
            _ => base.saturating_mul(2),
        };
        hours.clamp(
            self.scheduler.min_frequency_hours,
            self.scheduler
                .max_frequency_hours
                .max(self.scheduler.min_frequency_hours),
        )
    }
}

/// 抽样页面：提示页面优先，没有提示时使用站点地址
fn sample_urls(source: &Source) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in &source.submission.hint_urls {
        if !urls.contains(url) {
            urls.push(url.clone());
        }
    }
    if urls.is_empty() {
        urls.push(source.base_url().to_string());
    }
    urls.truncate(MAX_SAMPLED_URLS);
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::source::SourceSubmission;
    use crate::domain::models::task::Priority;
    use crate::engines::traits::{ExtractionError, ExtractionResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct PageClient;

    #[async_trait]
    impl ExtractionClient for PageClient {
        async fn extract(
            &self,
            request: &ExtractionRequest,
        ) -> Result<ExtractionResponse, ExtractionError> {
            if request.url.ends_with("/broken") {
                return Err(ExtractionError::Dns("no such host".into()));
            }
            let events: Vec<_> = (0..6)
                .map(|i| json!({"title": format!("Swim {}", i), "image_url": "https://x.example/i.png"}))
                .collect();
            Ok(ExtractionResponse {
                success: true,
                raw_structured_data: json!({ "events": events }),
                selectors: Some(BTreeMap::from([(
                    "title".to_string(),
                    "h2.event".to_string(),
                )])),
                ..Default::default()
            })
        }

        fn name(&self) -> &'static str {
            "page"
        }
    }

    fn analyzer() -> SourceAnalyzer {
        SourceAnalyzer::new(
            Arc::new(PageClient),
            QualityScorer::default(),
            ClientProfile {
                user_agent: "test".into(),
                timeout: Duration::from_secs(5),
            },
            SchedulerSettings::default(),
        )
    }

    fn source(hints: &[&str]) -> Source {
        Source::new(SourceSubmission {
            name: "Riverside Pool".into(),
            base_url: "https://pool.example".into(),
            source_type: SourceType::Venue,
            priority: Priority::Medium,
            expected_content: vec![],
            hint_urls: hints.iter().map(|s| s.to_string()).collect(),
            submitted_by: "founder".into(),
        })
    }

    #[tokio::test]
    async fn test_analysis_collects_targets_and_selectors() {
        let analysis = analyzer()
            .analyze(&source(&["https://pool.example/swim", "https://pool.example/broken"]))
            .await;

        assert!(analysis.is_complete());
        assert_eq!(analysis.target_urls, vec!["https://pool.example/swim"]);
        assert_eq!(analysis.activities_sampled, 6);
        assert_eq!(analysis.selectors.get("title").unwrap(), "h2.event");
        assert!((analysis.quality_score - 0.2).abs() < 1e-9);
        assert_eq!(analysis.recommended_frequency_hours, 24);
        assert_eq!(analysis.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_fails_when_every_page_fails() {
        let analysis = analyzer()
            .analyze(&source(&["https://pool.example/broken"]))
            .await;
        assert!(!analysis.is_complete());
        assert!(analysis.error.unwrap().contains("all sampled pages failed"));
    }

    #[tokio::test]
    async fn test_signal_on_closed_channel_is_not_fatal() {
        let (queue, rx) = AnalysisQueue::channel(1);
        drop(rx);
        assert!(!queue.signal(Uuid::new_v4()));
    }

    #[test]
    fn test_sample_urls_falls_back_to_base_url() {
        assert_eq!(sample_urls(&source(&[])), vec!["https://pool.example"]);
    }
}
