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

use crate::domain::models::admin_event::ExtractionSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// 提取错误类型
///
/// 是否重试由执行引擎的错误策略决定，这里只描述发生了什么
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// 反爬响应（403/429/验证页等）
    #[error("Anti-scraping response: {0}")]
    AntiScraping(String),
    /// TLS/SSL 握手失败
    #[error("TLS error: {0}")]
    Tls(String),
    /// 域名解析失败
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    /// 超时
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    /// 其他网络错误
    #[error("Transport error: {0}")]
    Transport(String),
    /// 上游服务错误（5xx）
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },
    /// 请求被拒绝（4xx）
    #[error("Request rejected {status}: {message}")]
    Rejected { status: u16, message: String },
    /// 原始内容过短
    #[error("Content too short: {length} < {minimum} characters")]
    ContentTooShort { length: usize, minimum: usize },
    /// 提取服务报告失败
    #[error("Extraction unsuccessful: {0}")]
    Unsuccessful(String),
    /// 无法解析的响应
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 客户端呈现参数
///
/// 每次尝试都构造新的值传给提取客户端，工作任务之间不共享可变状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub user_agent: String,
    pub timeout: Duration,
}

/// 提取请求
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// 目标URL
    pub url: String,
    /// 提取模式
    pub schema: ExtractionSchema,
    /// 客户端呈现参数
    pub profile: ClientProfile,
}

/// 提取响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionResponse {
    pub success: bool,
    /// 结构化的候选记录
    pub raw_structured_data: Value,
    /// 页面原始文本，用于内容长度检查与内容指纹
    pub raw_content: Option<String>,
    pub events_count: u32,
    pub credits_used: u64,
    pub tokens_used: u64,
    pub processing_time_ms: u64,
    /// 提取服务发现的选择器
    pub selectors: Option<BTreeMap<String, String>>,
    /// 失败原因
    pub error: Option<String>,
}

impl ExtractionResponse {
    /// 原始内容字符数；没有原始文本时以结构化数据的长度代替
    pub fn content_length(&self) -> usize {
        match &self.raw_content {
            Some(content) => content.chars().count(),
            None => match &self.raw_structured_data {
                Value::Null => 0,
                other => other.to_string().chars().count(),
            },
        }
    }

    /// 检查结果是否可用：提取服务报告成功，且内容不短于 `minimum`
    pub fn validated(self, minimum: usize) -> Result<Self, ExtractionError> {
        if !self.success {
            return Err(ExtractionError::Unsuccessful(
                self.error
                    .unwrap_or_else(|| "extraction reported failure".to_string()),
            ));
        }
        let length = self.content_length();
        if length < minimum {
            return Err(ExtractionError::ContentTooShort { length, minimum });
        }
        Ok(self)
    }
}

/// 外部内容提取服务
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// 按给定模式提取页面中的结构化记录
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError>;

    /// 客户端名称
    fn name(&self) -> &'static str;
}
