// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::EngineSettings;
use crate::domain::models::activity::{candidates_from_payload, ActivityCandidate};
use crate::domain::models::admin_event::ExtractionSchema;
use crate::domain::models::source::SourceConfig;
use crate::domain::repositories::activity_repository::ActivityRepository;
use crate::domain::services::deduplicator::{content_fingerprint, deduplicate_by};
use crate::domain::services::quality_scorer::{mean, QualityScorer};
use crate::domain::services::source_analyzer::schema_for;
use crate::engines::error_policy::{ErrorClass, ErrorPolicyTable};
use crate::engines::traits::{
    ClientProfile, ExtractionClient, ExtractionError, ExtractionRequest, ExtractionResponse,
};
use crate::utils::retry_policy::RetryPolicy;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// 单个数据源的运行结果
#[derive(Debug, Clone, Serialize)]
pub struct SourceRunResult {
    pub source_id: Uuid,
    pub source_name: String,
    pub success: bool,
    /// 所有目标页面的提取调用次数之和
    pub attempts: u32,
    pub activities_found: usize,
    /// 批次去重后保留的记录数
    pub unique_activities: usize,
    /// 尚未发布过的记录数
    pub new_activities: usize,
    pub quality_score: f64,
    pub content_hash: Option<String>,
    pub processing_time_ms: u64,
    pub credits_used: u64,
    pub tokens_used: u64,
    pub error: Option<String>,
    /// 失败只由可重试错误造成时为真
    pub retryable: bool,
    /// 首个目标页面，审核事件以它作为来源地址
    pub source_url: String,
    #[serde(skip)]
    pub schema: Option<ExtractionSchema>,
    /// 批次去重后的候选记录
    #[serde(skip)]
    pub candidates: Vec<ActivityCandidate>,
}

impl SourceRunResult {
    fn failed(config: &SourceConfig, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            source_id: config.source_id,
            source_name: config.source_name.clone(),
            success: false,
            attempts,
            activities_found: 0,
            unique_activities: 0,
            new_activities: 0,
            quality_score: 0.0,
            content_hash: None,
            processing_time_ms: 0,
            credits_used: 0,
            tokens_used: 0,
            error: Some(error.into()),
            retryable: true,
            source_url: primary_url(config),
            schema: None,
            candidates: Vec::new(),
        }
    }
}

/// 批次汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub sources_attempted: usize,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub activities_found: usize,
    pub new_activities: usize,
    pub duplicates_removed: usize,
    pub total_credits: u64,
    pub total_tokens: u64,
    pub average_quality: f64,
    pub duration_ms: u64,
    /// 是否在全局时间预算内完成
    pub completed_within_deadline: bool,
    pub results: Vec<SourceRunResult>,
}

/// 抓取执行引擎
///
/// 在固定大小的并发池中对每个数据源调用提取服务，应用按域名的错误策略，
/// 所有数据源结束后统一去重、评分并汇总
pub struct ExecutionEngine {
    client: Arc<dyn ExtractionClient>,
    activities: Arc<dyn ActivityRepository>,
    policies: ErrorPolicyTable,
    scorer: QualityScorer,
    settings: EngineSettings,
    limiters: DashMap<Uuid, (u32, Arc<DirectRateLimiter>)>,
}

/// 单个页面的提取结果
struct PageOutcome {
    attempts: u32,
    result: Result<ExtractionResponse, ExtractionError>,
}

impl ExecutionEngine {
    /// 创建执行引擎
    ///
    /// # 参数
    ///
    /// * `client` - 提取服务客户端
    /// * `activities` - 已发布活动仓库，用于判断记录是否为新记录
    /// * `policies` - 按域名的错误策略表
    /// * `scorer` - 质量评分器
    /// * `settings` - 引擎配置
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        activities: Arc<dyn ActivityRepository>,
        policies: ErrorPolicyTable,
        scorer: QualityScorer,
        settings: EngineSettings,
    ) -> Self {
        Self {
            client,
            activities,
            policies,
            scorer,
            settings,
            limiters: DashMap::new(),
        }
    }

    /// 运行一个批次
    ///
    /// # 参数
    ///
    /// * `configs` - 候选数据源配置，未启用的会被跳过
    /// * `source_filter` - 可选的数据源白名单
    ///
    /// # 返回值
    ///
    /// 批次汇总。超过全局时间预算时，已完成的数据源照常汇总，未完成的记为失败
    #[instrument(skip_all, fields(sources = configs.len()))]
    pub async fn run_batch(
        &self,
        configs: Vec<SourceConfig>,
        source_filter: Option<&[Uuid]>,
    ) -> BatchSummary {
        let started = Instant::now();
        let configs: Vec<SourceConfig> = configs
            .into_iter()
            .filter(|c| c.enabled)
            .filter(|c| source_filter.map_or(true, |ids| ids.contains(&c.source_id)))
            .collect();
        if configs.is_empty() {
            debug!("No enabled sources to run");
            return BatchSummary {
                completed_within_deadline: true,
                ..Default::default()
            };
        }

        let deadline = tokio::time::Instant::now() + self.settings.batch_deadline();
        let mut in_flight = stream::iter(configs.iter().cloned())
            .map(|config| self.run_source(config))
            .buffer_unordered(self.settings.max_concurrency.max(1));

        let mut finished: HashMap<Uuid, SourceRunResult> = HashMap::new();
        let mut within_deadline = true;
        loop {
            match tokio::time::timeout_at(deadline, in_flight.next()).await {
                Ok(Some(result)) => {
                    finished.insert(result.source_id, result);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Batch deadline reached with {} of {} source(s) finished",
                        finished.len(),
                        configs.len()
                    );
                    within_deadline = false;
                    break;
                }
            }
        }
        drop(in_flight);

        // 按输入顺序汇总，未完成的数据源记为失败
        let mut results: Vec<SourceRunResult> = configs
            .iter()
            .map(|config| {
                finished.remove(&config.source_id).unwrap_or_else(|| {
                    SourceRunResult::failed(config, 0, "batch deadline exceeded")
                })
            })
            .collect();

        let duplicates_removed = self.deduplicate(&mut results).await;
        let summary = summarize(results, duplicates_removed, within_deadline, started.elapsed());

        counter!("batch_sources_total", "result" => "success")
            .increment(summary.successful_sources as u64);
        counter!("batch_sources_total", "result" => "failure")
            .increment(summary.failed_sources as u64);
        counter!("duplicates_removed_total").increment(summary.duplicates_removed as u64);
        histogram!("batch_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            "Batch finished: {}/{} source(s) succeeded, {} activities ({} new, {} duplicates) in {}ms",
            summary.successful_sources,
            summary.sources_attempted,
            summary.activities_found,
            summary.new_activities,
            summary.duplicates_removed,
            summary.duration_ms
        );
        summary
    }

    /// 批次去重：每个去重键只保留第一次出现，并标记已发布过的记录
    async fn deduplicate(&self, results: &mut [SourceRunResult]) -> usize {
        let tagged: Vec<(usize, ActivityCandidate)> = results
            .iter_mut()
            .enumerate()
            .flat_map(|(index, result)| {
                std::mem::take(&mut result.candidates)
                    .into_iter()
                    .map(move |candidate| (index, candidate))
            })
            .collect();
        let deduplicated = deduplicate_by(tagged, |(_, candidate)| candidate.dedup_key());

        for (index, candidate) in deduplicated.unique {
            let published = match self
                .activities
                .exists_by_dedup_key(&candidate.dedup_key())
                .await
            {
                Ok(exists) => exists,
                Err(e) => {
                    warn!("Could not check dedup key, treating record as new: {}", e);
                    false
                }
            };
            let result = &mut results[index];
            result.unique_activities += 1;
            if !published {
                result.new_activities += 1;
                result.candidates.push(candidate);
            }
        }
        deduplicated.removed
    }

    /// 抓取一个数据源的全部目标页面
    #[instrument(skip_all, fields(source_id = %config.source_id))]
    async fn run_source(&self, config: SourceConfig) -> SourceRunResult {
        let urls = target_urls(&config);
        let limiter = self.limiter_for(&config);
        let schema = schema_for(config.source_type);

        let mut attempts = 0;
        let mut candidates = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded_pages = 0;
        let mut result = SourceRunResult::failed(&config, 0, String::new());

        for url in &urls {
            let page = self
                .extract_page(&config, url, &schema, limiter.as_ref())
                .await;
            attempts += page.attempts;
            match page.result {
                Ok(response) => {
                    succeeded_pages += 1;
                    result.processing_time_ms += response.processing_time_ms;
                    result.credits_used += response.credits_used;
                    result.tokens_used += response.tokens_used;
                    candidates.extend(candidates_from_payload(&response.raw_structured_data));
                }
                Err(e) => {
                    warn!("Source {} page {} failed: {}", config.source_id, url, e);
                    if self.policies.for_url(url).classify(&e) == ErrorClass::Terminal {
                        result.retryable = false;
                    }
                    errors.push(format!("{}: {}", url, e));
                }
            }
        }

        result.attempts = attempts;
        if succeeded_pages == 0 {
            result.error = Some(errors.join("; "));
            return result;
        }
        if !errors.is_empty() {
            info!(
                "Source {} partially succeeded ({} of {} page(s))",
                config.source_id,
                succeeded_pages,
                urls.len()
            );
        }

        result.success = true;
        result.error = None;
        result.activities_found = candidates.len();
        result.quality_score = self.scorer.average(&candidates);
        result.content_hash = Some(content_fingerprint(&candidates));
        result.schema = Some(schema);
        result.candidates = candidates;
        result
    }

    /// 提取单个页面，按错误策略重试
    async fn extract_page(
        &self,
        config: &SourceConfig,
        url: &str,
        schema: &ExtractionSchema,
        limiter: &DirectRateLimiter,
    ) -> PageOutcome {
        let policy = self.policies.for_url(url);
        let retry = RetryPolicy::new(
            policy
                .max_attempts()
                .unwrap_or(config.retry_policy.max_attempts),
            self.settings.backoff_unit(),
            self.settings.max_backoff(),
        );
        let base = ClientProfile {
            user_agent: self
                .policies
                .user_agents()
                .first()
                .cloned()
                .unwrap_or_else(|| format!("harvestrs/{}", env!("CARGO_PKG_VERSION"))),
            timeout: policy
                .timeout()
                .unwrap_or(Duration::from_secs(config.retry_policy.timeout_secs)),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            limiter.until_ready().await;
            let profile = policy.prepare(&base, self.policies.user_agents(), attempt);
            let request = ExtractionRequest {
                url: url.to_string(),
                schema: schema.clone(),
                profile,
            };

            let result = match tokio::time::timeout(
                request.profile.timeout,
                self.client.extract(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ExtractionError::Timeout(request.profile.timeout)),
            }
            .and_then(|response| response.validated(self.settings.min_content_length));

            let error = match result {
                Ok(response) => {
                    counter!("extraction_attempts_total", "outcome" => "success").increment(1);
                    return PageOutcome {
                        attempts: attempt,
                        result: Ok(response),
                    };
                }
                Err(e) => e,
            };

            let class = policy.classify(&error);
            let outcome = match class {
                ErrorClass::Retryable => "retryable",
                ErrorClass::Terminal => "terminal",
            };
            counter!("extraction_attempts_total", "outcome" => outcome).increment(1);

            if class == ErrorClass::Terminal || !retry.should_retry(attempt) {
                debug!(
                    "Giving up on {} after {} attempt(s): {}",
                    url, attempt, error
                );
                return PageOutcome {
                    attempts: attempt,
                    result: Err(error),
                };
            }

            let backoff = retry.calculate_backoff(attempt);
            debug!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempt, url, error, backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// 数据源的限流器，配额变化时重建
    fn limiter_for(&self, config: &SourceConfig) -> Arc<DirectRateLimiter> {
        let rpm = if config.rate_limit.requests_per_minute == 0 {
            self.settings.default_requests_per_minute
        } else {
            config.rate_limit.requests_per_minute
        };
        if let Some(entry) = self.limiters.get(&config.source_id) {
            if entry.0 == rpm {
                return entry.1.clone();
            }
        }
        let quota = Quota::per_minute(NonZeroU32::new(rpm).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        self.limiters
            .insert(config.source_id, (rpm, limiter.clone()));
        limiter
    }
}

fn target_urls(config: &SourceConfig) -> Vec<String> {
    if config.target_urls.is_empty() {
        vec![config.base_url.clone()]
    } else {
        config.target_urls.clone()
    }
}

fn primary_url(config: &SourceConfig) -> String {
    config
        .target_urls
        .first()
        .cloned()
        .unwrap_or_else(|| config.base_url.clone())
}

fn summarize(
    results: Vec<SourceRunResult>,
    duplicates_removed: usize,
    completed_within_deadline: bool,
    elapsed: Duration,
) -> BatchSummary {
    let successful_sources = results.iter().filter(|r| r.success).count();
    BatchSummary {
        sources_attempted: results.len(),
        successful_sources,
        failed_sources: results.len() - successful_sources,
        activities_found: results.iter().map(|r| r.activities_found).sum(),
        new_activities: results.iter().map(|r| r.new_activities).sum(),
        duplicates_removed,
        total_credits: results.iter().map(|r| r.credits_used).sum(),
        total_tokens: results.iter().map(|r| r.tokens_used).sum(),
        average_quality: mean(
            results
                .iter()
                .filter(|r| r.success)
                .map(|r| r.quality_score),
        ),
        duration_ms: elapsed.as_millis() as u64,
        completed_within_deadline,
        results,
    }
}

#[cfg(test)]
#[path = "execution_engine_test.rs"]
mod execution_engine_test;
