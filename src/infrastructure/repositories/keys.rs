// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 主键与二级索引键
//!
//! 所有键都由实体属性确定性地计算，查询模式因此不需要全表扫描。
//! 排序键中的时间统一为定宽 UTC 文本，字典序即时间序。

use crate::domain::models::activity::Activity;
use crate::domain::models::admin_event::AdminEvent;
use crate::domain::models::execution::Execution;
use crate::domain::models::source::{Source, SourceConfig};
use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::domain::repositories::store::IndexKey;
use crate::utils::url_utils;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

// Source Management
pub const SK_SUBMISSION: &str = "SUBMISSION";
pub const SK_ANALYSIS: &str = "ANALYSIS";
pub const SK_CONFIG: &str = "CONFIG";
pub const IDX_STATUS_PRIORITY: &str = "status_priority";
pub const IDX_BASE_URL: &str = "base_url";
pub const IDX_DOMAIN: &str = "domain";
pub const IDX_CONFIG_ENABLED: &str = "config_enabled";

// Scraping Operations
pub const PK_TASK: &str = "TASK";
pub const PK_EXECUTION: &str = "EXECUTION";
pub const PK_PENDING: &str = "PENDING";
pub const IDX_NEXT_RUN: &str = "next_run";
pub const IDX_SOURCE_PRIORITY: &str = "source_priority";
pub const IDX_SOURCE_EXECUTIONS: &str = "source_executions";

// Business Entities
pub const PK_ACTIVITY: &str = "ACTIVITY";
pub const PK_ADMIN_EVENT: &str = "ADMIN_EVENT";
pub const PK_DEDUP: &str = "DEDUP";
pub const IDX_LOCATION_DATE: &str = "location_date";
pub const IDX_CATEGORY: &str = "category";
pub const IDX_CATEGORY_AGE: &str = "category_age";
pub const IDX_VENUE: &str = "venue";
pub const IDX_PROVIDER: &str = "provider";
pub const IDX_UPDATED: &str = "updated";
pub const IDX_DEDUP_KEY: &str = "dedup_key";
pub const IDX_EVENT_STATUS: &str = "status";
pub const IDX_SOURCE_URL: &str = "source_url";
pub const IDX_EVENT_DEDUP: &str = "event_dedup";

/// 未填写年龄段时使用的占位
pub const ALL_AGES: &str = "all";

/// 定宽时间文本
pub fn time_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// 倒序时间键，越新越小
pub fn inverted_time_key(at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis().max(0) as u64;
    format!("{:020}", u64::MAX / 2 - millis)
}

fn normalized(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn source_pk(id: Uuid) -> String {
    format!("SOURCE#{}", id)
}

pub fn status_hash(status: impl std::fmt::Display) -> String {
    format!("STATUS#{}", status)
}

pub fn url_hash(url: &str) -> String {
    format!("URL#{}", url_utils::normalize_url(url))
}

pub fn domain_hash(domain: &str) -> String {
    format!("DOMAIN#{}", normalized(domain))
}

/// 数据源提交记录的索引键
pub fn source_indexes(source: &Source) -> Vec<IndexKey> {
    let id = source.id.to_string();
    let mut keys = vec![
        IndexKey::new(
            IDX_STATUS_PRIORITY,
            status_hash(source.status),
            format!(
                "{}#{}#{}",
                source.submission.priority.rank(),
                inverted_time_key(source.created_at),
                id
            ),
        ),
        IndexKey::new(IDX_BASE_URL, url_hash(source.base_url()), id.clone()),
    ];
    if let Some(domain) = source.domain() {
        keys.push(IndexKey::new(IDX_DOMAIN, domain_hash(&domain), id));
    }
    keys
}

pub fn enabled_hash(enabled: bool) -> String {
    format!("ENABLED#{}", enabled)
}

pub fn config_indexes(config: &SourceConfig) -> Vec<IndexKey> {
    vec![IndexKey::new(
        IDX_CONFIG_ENABLED,
        enabled_hash(config.enabled),
        config.source_id.to_string(),
    )]
}

/// 待执行槽位的排序键
pub fn pending_sk(source_id: Uuid, task_type: TaskType) -> String {
    format!("{}#{}", source_id, task_type)
}

pub fn source_hash(source_id: Uuid) -> String {
    format!("SOURCE#{}", source_id)
}

/// 任务的索引键
///
/// 只有 `scheduled` 任务出现在 `next_run` 的 `STATUS#scheduled` 分桶里
pub fn task_indexes(task: &Task) -> Vec<IndexKey> {
    let scheduled = time_key(task.scheduled_time);
    vec![
        IndexKey::new(
            IDX_NEXT_RUN,
            status_hash(task.status),
            format!("{}#{}", scheduled, task.id),
        ),
        IndexKey::new(
            IDX_SOURCE_PRIORITY,
            source_hash(task.source_id),
            format!("{}#{}#{}", task.priority.rank(), scheduled, task.id),
        ),
    ]
}

/// `next_run` 索引中计划时间不晚于 `before` 的上界
pub fn next_run_upper_bound(before: DateTime<Utc>) -> String {
    // '~' 大于 '#' 之后的任何 uuid 字符
    format!("{}#~", time_key(before))
}

pub fn scheduled_bucket() -> String {
    status_hash(TaskStatus::Scheduled)
}

pub fn execution_indexes(execution: &Execution) -> Vec<IndexKey> {
    vec![IndexKey::new(
        IDX_SOURCE_EXECUTIONS,
        source_hash(execution.source_id),
        format!("{}#{}", time_key(execution.started_at), execution.id),
    )]
}

pub fn location_hash(location: &str) -> String {
    format!("LOCATION#{}", normalized(location))
}

pub fn date_key(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

pub fn category_hash(category: &str) -> String {
    format!("CATEGORY#{}", normalized(category))
}

pub fn category_age_hash(category: &str, age_group: &str) -> String {
    format!("CATEGORY#{}#AGE#{}", normalized(category), normalized(age_group))
}

pub fn venue_hash(venue_id: Uuid) -> String {
    format!("VENUE#{}", venue_id)
}

pub fn provider_hash(provider: &str) -> String {
    format!("PROVIDER#{}", normalized(provider))
}

pub fn dedup_hash(key: &str) -> String {
    format!("DEDUP#{}", key)
}

/// 活动的索引键
pub fn activity_indexes(activity: &Activity) -> Vec<IndexKey> {
    let id = activity.id.to_string();
    let mut keys = vec![
        IndexKey::new(
            IDX_UPDATED,
            PK_ACTIVITY,
            format!("{}#{}", time_key(activity.updated_at), id),
        ),
        IndexKey::new(IDX_DEDUP_KEY, dedup_hash(&activity.dedup_key()), id.clone()),
    ];
    if let Some(location) = activity.location.name.as_deref() {
        keys.push(IndexKey::new(
            IDX_LOCATION_DATE,
            location_hash(location),
            format!("{}#{}", date_key(activity.start_date), id),
        ));
    }
    if let Some(category) = activity.category.as_deref() {
        keys.push(IndexKey::new(
            IDX_CATEGORY,
            category_hash(category),
            format!("{}#{}", time_key(activity.updated_at), id),
        ));
        if activity.age_groups.is_empty() {
            keys.push(IndexKey::new(
                IDX_CATEGORY_AGE,
                category_age_hash(category, ALL_AGES),
                id.clone(),
            ));
        }
        for age in &activity.age_groups {
            keys.push(IndexKey::new(
                IDX_CATEGORY_AGE,
                category_age_hash(category, age),
                id.clone(),
            ));
        }
    }
    if let Some(venue_id) = activity.venue_id {
        keys.push(IndexKey::new(IDX_VENUE, venue_hash(venue_id), id.clone()));
    }
    if let Some(provider) = activity.provider.as_deref() {
        keys.push(IndexKey::new(IDX_PROVIDER, provider_hash(provider), id));
    }
    keys
}

/// 审核事件的索引键
pub fn admin_event_indexes(event: &AdminEvent) -> Vec<IndexKey> {
    let id = event.id.to_string();
    let mut keys = vec![
        IndexKey::new(
            IDX_EVENT_STATUS,
            status_hash(event.status),
            format!("{}#{}", inverted_time_key(event.created_at), id),
        ),
        IndexKey::new(IDX_SOURCE_URL, url_hash(&event.source_url), id.clone()),
    ];
    if let Some(key) = event.dedup_key() {
        keys.push(IndexKey::new(IDX_EVENT_DEDUP, dedup_hash(&key), id));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::activity::ActivityKind;
    use crate::domain::models::source::{SourceSubmission, SourceType};
    use crate::domain::models::task::Priority;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_time_keys_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2025, 1, 9, 8, 0, 0).unwrap();
        let late = early + Duration::milliseconds(1500);
        assert!(time_key(early) < time_key(late));
        assert_eq!(time_key(early).len(), time_key(late).len());
        assert!(inverted_time_key(late) < inverted_time_key(early));
    }

    #[test]
    fn test_source_indexes_rank_priority_first() {
        let submission = SourceSubmission {
            name: "Library".to_string(),
            base_url: "https://WWW.Library.example.org/".to_string(),
            source_type: SourceType::Municipal,
            priority: Priority::High,
            expected_content: vec![],
            hint_urls: vec![],
            submitted_by: "founder".to_string(),
        };
        let source = Source::new(submission);
        let keys = source_indexes(&source);

        let status = keys.iter().find(|k| k.index == IDX_STATUS_PRIORITY).unwrap();
        assert_eq!(status.hash_key, "STATUS#pending_analysis");
        assert!(status.sort_key.starts_with("0#"));

        let url = keys.iter().find(|k| k.index == IDX_BASE_URL).unwrap();
        assert_eq!(url.hash_key, "URL#https://library.example.org");

        let domain = keys.iter().find(|k| k.index == IDX_DOMAIN).unwrap();
        assert_eq!(domain.hash_key, "DOMAIN#library.example.org");
    }

    #[test]
    fn test_task_next_run_bound_includes_exact_time() {
        let at = Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap();
        let task = Task::new(
            Uuid::new_v4(),
            TaskType::FullScrape,
            Priority::Low,
            at,
            3,
            Duration::days(1),
        );
        let next_run = task_indexes(&task)
            .into_iter()
            .find(|k| k.index == IDX_NEXT_RUN)
            .unwrap();
        assert_eq!(next_run.hash_key, scheduled_bucket());
        assert!(next_run.sort_key <= next_run_upper_bound(at));
        assert!(next_run.sort_key > next_run_upper_bound(at - Duration::seconds(1)));
    }

    #[test]
    fn test_activity_indexes_cover_query_patterns() {
        let mut activity = Activity::new(ActivityKind::Class, "Pottery", "https://x.org");
        activity.location.name = Some("Art Barn".to_string());
        activity.start_date = NaiveDate::from_ymd_opt(2025, 9, 1);
        activity.category = Some("Arts".to_string());
        activity.age_groups = vec!["5-8".to_string(), "9-12".to_string()];
        activity.provider = Some("Clay Co".to_string());

        let keys = activity_indexes(&activity);
        let names: Vec<_> = keys.iter().map(|k| k.index.as_str()).collect();
        assert!(names.contains(&IDX_LOCATION_DATE));
        assert!(names.contains(&IDX_PROVIDER));
        assert!(!names.contains(&IDX_VENUE));
        assert_eq!(names.iter().filter(|n| **n == IDX_CATEGORY_AGE).count(), 2);

        let location = keys.iter().find(|k| k.index == IDX_LOCATION_DATE).unwrap();
        assert_eq!(location.hash_key, "LOCATION#art barn");
        assert!(location.sort_key.starts_with("2025-09-01#"));
    }
}
