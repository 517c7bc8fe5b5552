// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error::DomainError;
use crate::domain::models::task::Priority;
use crate::utils::url_utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 数据源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// 场馆官网
    Venue,
    /// 活动日历
    EventCalendar,
    /// 课程/活动提供方
    ActivityProvider,
    /// 市政或公共机构
    Municipal,
    /// 目录/聚合站点
    Directory,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceType::Venue => write!(f, "venue"),
            SourceType::EventCalendar => write!(f, "event_calendar"),
            SourceType::ActivityProvider => write!(f, "activity_provider"),
            SourceType::Municipal => write!(f, "municipal"),
            SourceType::Directory => write!(f, "directory"),
        }
    }
}

impl FromStr for SourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "venue" => Ok(SourceType::Venue),
            "event_calendar" => Ok(SourceType::EventCalendar),
            "activity_provider" => Ok(SourceType::ActivityProvider),
            "municipal" => Ok(SourceType::Municipal),
            "directory" => Ok(SourceType::Directory),
            other => Err(DomainError::ValidationError(format!(
                "unknown source type: {}",
                other
            ))),
        }
    }
}

/// 数据源生命周期状态
///
/// `pending_analysis → analyzing → analysis_complete → active`，
/// 任意非 `rejected` 状态都可以进入终态 `rejected`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    PendingAnalysis,
    Analyzing,
    AnalysisComplete,
    Active,
    Rejected,
}

impl SourceStatus {
    /// 判断状态转换是否合法
    ///
    /// `analyzing → analyzing` 用于重试分析
    pub fn can_transition_to(self, next: SourceStatus) -> bool {
        use SourceStatus::*;
        match (self, next) {
            (Rejected, _) => false,
            (_, Rejected) => true,
            (PendingAnalysis, Analyzing)
            | (Analyzing, Analyzing)
            | (Analyzing, AnalysisComplete)
            | (AnalysisComplete, Active) => true,
            _ => false,
        }
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, SourceStatus::Active | SourceStatus::Rejected)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceStatus::PendingAnalysis => write!(f, "pending_analysis"),
            SourceStatus::Analyzing => write!(f, "analyzing"),
            SourceStatus::AnalysisComplete => write!(f, "analysis_complete"),
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for SourceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_analysis" => Ok(SourceStatus::PendingAnalysis),
            "analyzing" => Ok(SourceStatus::Analyzing),
            "analysis_complete" => Ok(SourceStatus::AnalysisComplete),
            "active" => Ok(SourceStatus::Active),
            "rejected" => Ok(SourceStatus::Rejected),
            other => Err(DomainError::ValidationError(format!(
                "unknown source status: {}",
                other
            ))),
        }
    }
}

/// 创始人提交的数据源信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSubmission {
    pub name: String,
    pub base_url: String,
    pub source_type: SourceType,
    pub priority: Priority,
    /// 期望的内容标签，例如 "classes"、"camps"
    pub expected_content: Vec<String>,
    /// 提示分析器优先查看的页面
    pub hint_urls: Vec<String>,
    pub submitted_by: String,
}

impl SourceSubmission {
    /// 校验必填字段
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "source_name cannot be empty".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "base_url cannot be empty".to_string(),
            ));
        }
        if url_utils::parse_http_url(&self.base_url).is_none() {
            return Err(DomainError::ValidationError(format!(
                "base_url is not a valid http(s) URL: {}",
                self.base_url
            )));
        }
        if let Some(bad) = self
            .hint_urls
            .iter()
            .find(|u| url_utils::parse_http_url(u).is_none())
        {
            return Err(DomainError::ValidationError(format!(
                "hint_url is not a valid http(s) URL: {}",
                bad
            )));
        }
        Ok(())
    }
}

/// 数据源实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub submission: SourceSubmission,
    pub status: SourceStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// 由提交信息创建数据源，初始状态为 `pending_analysis`
    pub fn new(submission: SourceSubmission) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            submission,
            status: SourceStatus::PendingAnalysis,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.submission.name
    }

    pub fn base_url(&self) -> &str {
        &self.submission.base_url
    }

    pub fn domain(&self) -> Option<String> {
        url_utils::domain_of(&self.submission.base_url)
    }

    /// 执行状态转换
    pub fn transition(&mut self, next: SourceStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::transition(self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// 自动分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAnalysis {
    pub source_id: Uuid,
    /// 发现的选择器，字段名 → 选择器
    pub selectors: BTreeMap<String, String>,
    /// 建议抓取的目标页面
    pub target_urls: Vec<String>,
    /// 质量分数 [0, 1]
    pub quality_score: f64,
    /// 建议抓取频率（小时）
    pub recommended_frequency_hours: u32,
    /// 分析过程中抽样的页面数
    pub sampled_urls: usize,
    /// 抽样得到的活动数
    pub activities_sampled: usize,
    /// 非致命问题
    pub issues: Vec<String>,
    /// 分析失败原因；为空表示分析完成
    pub error: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl SourceAnalysis {
    /// 分析是否已成功完成
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// 构造一个失败的分析记录
    pub fn failed(source_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            source_id,
            selectors: BTreeMap::new(),
            target_urls: Vec::new(),
            quality_score: 0.0,
            recommended_frequency_hours: 0,
            sampled_urls: 0,
            activities_sampled: 0,
            issues: Vec::new(),
            error: Some(error.into()),
            analyzed_at: Utc::now(),
        }
    }
}

/// 限速配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
}

/// 单个数据源的重试配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceRetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 单次抓取超时（秒）
    pub timeout_secs: u64,
}

/// 生成数据源配置时使用的默认值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConfigDefaults {
    pub requests_per_minute: u32,
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub min_frequency_hours: u32,
    pub max_frequency_hours: u32,
}

/// 可靠性分数的平滑系数
const RELIABILITY_SMOOTHING: f64 = 0.3;

/// 激活后的抓取配置
///
/// 每个数据源至多一份，只在激活时由分析结果生成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: Uuid,
    pub source_name: String,
    pub base_url: String,
    pub source_type: SourceType,
    pub priority: Priority,
    pub target_urls: Vec<String>,
    pub selectors: BTreeMap<String, String>,
    pub rate_limit: RateLimit,
    pub retry_policy: SourceRetryPolicy,
    /// 可靠性分数 [0, 1]
    pub reliability_score: f64,
    /// 当前抓取间隔（小时）
    pub frequency_hours: u32,
    pub enabled: bool,
    /// 最近一次成功抓取的内容指纹
    pub last_content_hash: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceConfig {
    /// 由通过审核的分析结果生成配置
    pub fn from_analysis(
        source: &Source,
        analysis: &SourceAnalysis,
        defaults: &SourceConfigDefaults,
        admin_notes: Option<String>,
    ) -> Self {
        let target_urls = if analysis.target_urls.is_empty() {
            vec![source.base_url().to_string()]
        } else {
            analysis.target_urls.clone()
        };
        let now = Utc::now();
        Self {
            source_id: source.id,
            source_name: source.name().to_string(),
            base_url: source.base_url().to_string(),
            source_type: source.submission.source_type,
            priority: source.submission.priority,
            target_urls,
            selectors: analysis.selectors.clone(),
            rate_limit: RateLimit {
                requests_per_minute: defaults.requests_per_minute,
            },
            retry_policy: SourceRetryPolicy {
                max_attempts: defaults.max_attempts,
                timeout_secs: defaults.timeout_secs,
            },
            reliability_score: analysis.quality_score.clamp(0.0, 1.0),
            frequency_hours: analysis
                .recommended_frequency_hours
                .clamp(defaults.min_frequency_hours, defaults.max_frequency_hours),
            enabled: true,
            last_content_hash: None,
            admin_notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// 记录一次执行结果，更新可靠性分数与内容指纹
    pub fn record_run(&mut self, success: bool, content_hash: Option<String>) {
        let observed = if success { 1.0 } else { 0.0 };
        self.reliability_score = ((1.0 - RELIABILITY_SMOOTHING) * self.reliability_score
            + RELIABILITY_SMOOTHING * observed)
            .clamp(0.0, 1.0);
        if success && content_hash.is_some() {
            self.last_content_hash = content_hash;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> SourceSubmission {
        SourceSubmission {
            name: "Riverside Rec Center".to_string(),
            base_url: "https://riverside.example.org".to_string(),
            source_type: SourceType::Venue,
            priority: Priority::High,
            expected_content: vec!["classes".to_string()],
            hint_urls: vec!["https://riverside.example.org/classes".to_string()],
            submitted_by: "founder@example.org".to_string(),
        }
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission().validate().is_ok());

        let mut empty_name = submission();
        empty_name.name = "  ".to_string();
        assert!(empty_name.validate().is_err());

        let mut empty_url = submission();
        empty_url.base_url = String::new();
        assert_eq!(
            empty_url.validate().unwrap_err(),
            DomainError::ValidationError("base_url cannot be empty".to_string())
        );

        let mut bad_hint = submission();
        bad_hint.hint_urls.push("javascript:alert(1)".to_string());
        assert!(bad_hint.validate().is_err());
    }

    #[test]
    fn test_status_graph() {
        use SourceStatus::*;
        assert!(PendingAnalysis.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(AnalysisComplete));
        assert!(AnalysisComplete.can_transition_to(Active));
        assert!(Active.can_transition_to(Rejected));

        assert!(!Active.can_transition_to(PendingAnalysis));
        assert!(!Active.can_transition_to(Active));
        assert!(!PendingAnalysis.can_transition_to(Active));
        assert!(!AnalysisComplete.can_transition_to(Analyzing));
        assert!(!Rejected.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(PendingAnalysis));
    }

    #[test]
    fn test_no_path_back_to_pending() {
        use SourceStatus::*;
        let all = [PendingAnalysis, Analyzing, AnalysisComplete, Active, Rejected];
        for from in all {
            assert!(!from.can_transition_to(PendingAnalysis));
        }
    }

    #[test]
    fn test_config_from_analysis_falls_back_to_base_url() {
        let source = Source::new(submission());
        let mut analysis = SourceAnalysis::failed(source.id, "x");
        analysis.error = None;
        analysis.quality_score = 0.9;
        analysis.recommended_frequency_hours = 1;

        let defaults = SourceConfigDefaults {
            requests_per_minute: 10,
            max_attempts: 3,
            timeout_secs: 60,
            min_frequency_hours: 6,
            max_frequency_hours: 168,
        };
        let config = SourceConfig::from_analysis(&source, &analysis, &defaults, None);

        assert_eq!(config.target_urls, vec![source.base_url().to_string()]);
        assert_eq!(config.frequency_hours, 6);
        assert!(config.enabled);
    }

    #[test]
    fn test_record_run_moves_reliability() {
        let source = Source::new(submission());
        let mut analysis = SourceAnalysis::failed(source.id, "x");
        analysis.error = None;
        analysis.quality_score = 0.5;
        analysis.recommended_frequency_hours = 24;
        let defaults = SourceConfigDefaults {
            requests_per_minute: 10,
            max_attempts: 3,
            timeout_secs: 60,
            min_frequency_hours: 6,
            max_frequency_hours: 168,
        };
        let mut config = SourceConfig::from_analysis(&source, &analysis, &defaults, None);

        config.record_run(true, Some("abc".to_string()));
        assert!(config.reliability_score > 0.5);
        assert_eq!(config.last_content_hash.as_deref(), Some("abc"));

        let before = config.reliability_score;
        config.record_run(false, Some("ignored".to_string()));
        assert!(config.reliability_score < before);
        assert_eq!(config.last_content_hash.as_deref(), Some("abc"));
    }
}
