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

use crate::config::settings::ExtractionSettings;
use crate::domain::models::admin_event::ExtractionSchema;
use crate::engines::traits::{
    ExtractionClient, ExtractionError, ExtractionRequest, ExtractionResponse,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tracing::debug;

const BOT_WALL_MARKERS: &[&str] = &[
    "captcha",
    "cloudflare",
    "access denied",
    "are you a robot",
    "bot detection",
    "too many requests",
];

/// 请求体
#[derive(Debug, Serialize)]
struct ExtractBody<'a> {
    url: &'a str,
    schema: &'a ExtractionSchema,
    user_agent: &'a str,
    timeout_ms: u64,
}

/// HTTP内容提取客户端
///
/// 调用外部提取服务的 `POST {endpoint}/v1/extract`，并将网络与HTTP层面的失败
/// 映射为 `ExtractionError`
pub struct HttpExtractionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpExtractionClient {
    /// 创建提取客户端
    ///
    /// # 参数
    ///
    /// * `settings` - 提取服务配置
    ///
    /// # 返回值
    ///
    /// * `Ok(HttpExtractionClient)` - 客户端实例
    /// * `Err(reqwest::Error)` - 底层HTTP客户端构建失败
    pub fn new(settings: &ExtractionSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let body = ExtractBody {
            url: &request.url,
            schema: &request.schema,
            user_agent: &request.profile.user_agent,
            timeout_ms: request.profile.timeout.as_millis() as u64,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/extract", self.endpoint))
            .timeout(request.profile.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(&e, request.profile.timeout))?;
        let status = response.status();
        debug!(
            "Extraction service answered {} for {} in {:?}",
            status,
            request.url,
            start.elapsed()
        );

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, text));
        }

        let parsed: ExtractionResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        if !parsed.success {
            let reason = parsed
                .error
                .clone()
                .unwrap_or_else(|| "extraction service reported failure".to_string());
            return Err(if looks_like_bot_wall(&reason) {
                ExtractionError::AntiScraping(reason)
            } else {
                ExtractionError::Unsuccessful(reason)
            });
        }

        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// 将非2xx响应映射为提取错误
pub fn map_status(status: StatusCode, body: String) -> ExtractionError {
    let code = status.as_u16();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body
    };

    match code {
        403 | 429 | 503 => ExtractionError::AntiScraping(format!("HTTP {}: {}", code, message)),
        _ if looks_like_bot_wall(&message) => {
            ExtractionError::AntiScraping(format!("HTTP {}: {}", code, message))
        }
        500..=599 => ExtractionError::Upstream {
            status: code,
            message,
        },
        _ => ExtractionError::Rejected {
            status: code,
            message,
        },
    }
}

/// 将reqwest的发送错误映射为提取错误
fn map_transport_error(err: &reqwest::Error, timeout: Duration) -> ExtractionError {
    if err.is_timeout() {
        return ExtractionError::Timeout(timeout);
    }
    classify_transport_message(&error_chain(err))
}

/// 根据错误文本区分域名解析、TLS和其他网络错误
pub fn classify_transport_message(message: &str) -> ExtractionError {
    let lower = message.to_lowercase();
    if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("name resolution")
    {
        ExtractionError::Dns(message.to_string())
    } else if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
        ExtractionError::Tls(message.to_string())
    } else if lower.contains("timed out") {
        ExtractionError::Timeout(Duration::ZERO)
    } else {
        ExtractionError::Transport(message.to_string())
    }
}

fn looks_like_bot_wall(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOT_WALL_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
#[path = "http_extraction_test.rs"]
mod tests;
