// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::source::SourceConfigDefaults;
use crate::domain::services::quality_scorer::QualityWeights;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、服务器、提取服务、执行引擎、调度器和质量评分等所有配置项
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 外部提取服务配置
    pub extraction: ExtractionSettings,
    /// 执行引擎配置
    pub engine: EngineSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 质量评分权重
    pub quality: QualityWeights,
    /// 指标导出配置
    pub metrics: MetricsSettings,
    /// 日志配置
    pub telemetry: TelemetrySettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/harvestrs".to_string(),
            max_connections: Some(20),
            min_connections: Some(2),
            connect_timeout: Some(10),
            idle_timeout: Some(300),
        }
    }
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 管理接口密钥，未设置时管理接口不做鉴权
    pub admin_api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            admin_api_key: None,
        }
    }
}

/// 外部提取服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// 提取服务地址
    pub endpoint: String,
    /// 提取服务密钥
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 可轮换的客户端标识
    pub user_agents: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
        }
    }
}

/// 单个域名的错误策略配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DomainPolicySettings {
    /// 域名（不含 www.）
    pub domain: String,
    /// 额外视为可重试的错误模式（正则）
    pub retry_on: Vec<String>,
    /// 额外视为终止的错误模式（正则），优先于 retry_on
    pub terminal_on: Vec<String>,
    /// 重试时是否轮换客户端标识
    pub rotate_user_agent: bool,
    /// 覆盖最大尝试次数
    pub max_attempts: Option<u32>,
    /// 覆盖单次超时（秒）
    pub timeout_secs: Option<u64>,
}

/// 执行引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 同时进行的提取数上限
    pub max_concurrency: usize,
    /// 原始内容最少字符数
    pub min_content_length: usize,
    /// 退避单位（毫秒）
    pub backoff_unit_ms: u64,
    /// 最大退避（毫秒）
    pub max_backoff_ms: u64,
    /// 默认单源超时（秒）
    pub default_timeout_secs: u64,
    /// 默认最大尝试次数
    pub default_max_attempts: u32,
    /// 默认每分钟请求数
    pub default_requests_per_minute: u32,
    /// 整个批次的时间预算（秒）
    pub batch_deadline_secs: u64,
    /// 按域名的错误策略
    pub domain_policies: Vec<DomainPolicySettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            min_content_length: 200,
            backoff_unit_ms: 2_000,
            max_backoff_ms: 30_000,
            default_timeout_secs: 120,
            default_max_attempts: 3,
            default_requests_per_minute: 30,
            batch_deadline_secs: 840,
            domain_policies: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// 退避单位
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// 最大退避
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// 批次时间预算
    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }
}

/// 调度器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// 初始任务的延迟（秒）
    pub initial_delay_secs: i64,
    /// 手动触发任务的延迟（秒）
    pub manual_delay_secs: i64,
    /// 手动触发任务的最大重试次数
    pub manual_max_retries: u32,
    /// 常规任务的最大重试次数
    pub default_max_retries: u32,
    /// 抓取频率下限（小时）
    pub min_frequency_hours: u32,
    /// 抓取频率上限（小时）
    pub max_frequency_hours: u32,
    /// 默认抓取频率（小时）
    pub default_frequency_hours: u32,
    /// 任务记录保留天数
    pub task_ttl_days: i64,
    /// 执行记录保留天数
    pub execution_ttl_days: i64,
    /// 批处理轮询间隔（秒）
    pub tick_interval_secs: u64,
    /// 每轮最多拉取的任务数
    pub batch_size: usize,
    /// 自适应频率参考的最近执行数
    pub stability_window: usize,
    /// 放宽频率的倍数
    pub widen_factor: f64,
    /// 收紧频率的倍数
    pub narrow_factor: f64,
    /// 放宽频率所需的可靠性分数
    pub reliability_threshold: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 30,
            manual_delay_secs: 60,
            manual_max_retries: 1,
            default_max_retries: 3,
            min_frequency_hours: 6,
            max_frequency_hours: 24 * 14,
            default_frequency_hours: 24,
            task_ttl_days: 30,
            execution_ttl_days: 90,
            tick_interval_secs: 300,
            batch_size: 20,
            stability_window: 5,
            widen_factor: 1.5,
            narrow_factor: 0.5,
            reliability_threshold: 0.8,
        }
    }
}

/// 指标导出配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出
    pub enabled: bool,
    /// 监听地址
    pub listen_addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:9000".to_string(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// 是否输出JSON格式日志
    pub json: bool,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// 以 `HARVESTRS__` 为前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("engine.max_concurrency", 3)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("HARVESTRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 新数据源配置的默认值
    pub fn source_defaults(&self) -> SourceConfigDefaults {
        SourceConfigDefaults {
            requests_per_minute: self.engine.default_requests_per_minute,
            max_attempts: self.engine.default_max_attempts,
            timeout_secs: self.engine.default_timeout_secs,
            min_frequency_hours: self.scheduler.min_frequency_hours,
            max_frequency_hours: self.scheduler.max_frequency_hours,
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;
