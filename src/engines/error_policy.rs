// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{DomainPolicySettings, EngineSettings, ExtractionSettings};
use crate::engines::traits::{ClientProfile, ExtractionError};
use crate::utils::url_utils::domain_of;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// 错误分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 退避后重试
    Retryable,
    /// 立即失败，不再重试
    Terminal,
}

/// 单个域名的错误策略
///
/// 引擎对所有数据源统一调用 `classify` 与 `prepare`，域名之间的差异只体现在表项里
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    retry_on: Vec<Regex>,
    terminal_on: Vec<Regex>,
    rotate_user_agent: bool,
    max_attempts: Option<u32>,
    timeout: Option<Duration>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            retry_on: Vec::new(),
            terminal_on: Vec::new(),
            rotate_user_agent: true,
            max_attempts: None,
            timeout: None,
        }
    }
}

impl ErrorPolicy {
    /// 从配置构建策略，无法编译的模式会被跳过
    pub fn from_settings(settings: &DomainPolicySettings) -> Self {
        Self {
            retry_on: compile_patterns(&settings.domain, &settings.retry_on),
            terminal_on: compile_patterns(&settings.domain, &settings.terminal_on),
            rotate_user_agent: settings.rotate_user_agent,
            max_attempts: settings.max_attempts,
            timeout: settings.timeout_secs.map(Duration::from_secs),
        }
    }

    /// 判断错误是否可重试
    ///
    /// 内容过短始终是终止错误；其余情况先匹配域名的终止模式，再匹配重试模式，
    /// 最后回落到错误类型的默认分类
    pub fn classify(&self, error: &ExtractionError) -> ErrorClass {
        if matches!(error, ExtractionError::ContentTooShort { .. }) {
            return ErrorClass::Terminal;
        }
        let text = error.to_string();
        if self.terminal_on.iter().any(|re| re.is_match(&text)) {
            return ErrorClass::Terminal;
        }
        if self.retry_on.iter().any(|re| re.is_match(&text)) {
            return ErrorClass::Retryable;
        }
        default_class(error)
    }

    /// 为第 `attempt` 次尝试（从 1 开始）生成客户端参数
    pub fn prepare(&self, base: &ClientProfile, user_agents: &[String], attempt: u32) -> ClientProfile {
        let user_agent = if self.rotate_user_agent && attempt > 1 && !user_agents.is_empty() {
            let index = (attempt as usize - 1) % user_agents.len();
            user_agents[index].clone()
        } else {
            base.user_agent.clone()
        };
        ClientProfile {
            user_agent,
            timeout: self.timeout.unwrap_or(base.timeout),
        }
    }

    /// 覆盖的最大尝试次数
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// 覆盖的单次超时
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn compile_patterns(domain: &str, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(&format!("(?i){}", pattern)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(
                    "Ignoring invalid error pattern '{}' for domain {}: {}",
                    pattern, domain, e
                );
                None
            }
        })
        .collect()
}

/// 错误类型的默认分类
pub fn default_class(error: &ExtractionError) -> ErrorClass {
    match error {
        ExtractionError::AntiScraping(_)
        | ExtractionError::Tls(_)
        | ExtractionError::Timeout(_)
        | ExtractionError::Transport(_)
        | ExtractionError::Upstream { .. }
        | ExtractionError::InvalidResponse(_) => ErrorClass::Retryable,
        ExtractionError::Dns(_)
        | ExtractionError::Rejected { .. }
        | ExtractionError::ContentTooShort { .. }
        | ExtractionError::Unsuccessful(_) => ErrorClass::Terminal,
    }
}

/// 域名到错误策略的查找表
#[derive(Debug, Clone, Default)]
pub struct ErrorPolicyTable {
    default_policy: ErrorPolicy,
    by_domain: HashMap<String, ErrorPolicy>,
    user_agents: Vec<String>,
}

impl ErrorPolicyTable {
    pub fn new(default_policy: ErrorPolicy, user_agents: Vec<String>) -> Self {
        Self {
            default_policy,
            by_domain: HashMap::new(),
            user_agents,
        }
    }

    /// 根据引擎与提取服务配置构建查找表
    pub fn from_settings(engine: &EngineSettings, extraction: &ExtractionSettings) -> Self {
        let mut table = Self::new(ErrorPolicy::default(), extraction.user_agents.clone());
        for policy in &engine.domain_policies {
            table = table.with_domain(&policy.domain, ErrorPolicy::from_settings(policy));
        }
        table
    }

    /// 添加或替换一个域名的策略
    pub fn with_domain(mut self, domain: &str, policy: ErrorPolicy) -> Self {
        let key = domain.trim().trim_start_matches("www.").to_lowercase();
        self.by_domain.insert(key, policy);
        self
    }

    /// 查找URL对应的策略
    ///
    /// 子域名会继承上级域名的策略，例如 `events.example.com` 使用 `example.com` 的表项
    pub fn for_url(&self, url: &str) -> &ErrorPolicy {
        let Some(mut host) = domain_of(url) else {
            return &self.default_policy;
        };
        loop {
            if let Some(policy) = self.by_domain.get(&host) {
                return policy;
            }
            match host.split_once('.') {
                Some((_, parent)) if parent.contains('.') => host = parent.to_string(),
                _ => return &self.default_policy,
            }
        }
    }

    /// 可轮换的客户端标识
    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }
}
