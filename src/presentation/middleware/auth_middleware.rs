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

use crate::presentation::errors::error_envelope;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// 管理接口认证状态
#[derive(Clone, Default)]
pub struct AdminAuth {
    /// 配置的管理密钥；为空时不做认证
    api_key: Option<Arc<str>>,
}

impl AdminAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key
                .filter(|key| !key.trim().is_empty())
                .map(|key| Arc::from(key.as_str())),
        }
    }

    /// 比较摘要，避免按字节提前返回
    fn accepts(&self, token: &str) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => {
                Sha256::digest(expected.as_bytes()) == Sha256::digest(token.as_bytes())
            }
        }
    }
}

fn unauthorized(message: &str) -> Response {
    error_envelope(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// 管理接口认证中间件
///
/// 校验 `Authorization: Bearer {admin_api_key}`
///
/// # 参数
///
/// * `state` - 认证状态
/// * `req` - HTTP请求
/// * `next` - 下一个中间件
pub async fn admin_auth_middleware(
    State(state): State<AdminAuth>,
    req: Request,
    next: Next,
) -> Response {
    if state.api_key.is_none() {
        return next.run(req).await;
    }
    debug!("Authenticating admin request to {}", req.uri().path());

    let Some(auth_header) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return unauthorized("missing Authorization header");
    };
    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized("expected a Bearer token");
    };

    if !state.accepts(token.trim()) {
        warn!("Rejected admin request to {}: invalid key", req.uri().path());
        return unauthorized("invalid admin key");
    }
    next.run(req).await
}

#[cfg(test)]
#[path = "auth_middleware_test.rs"]
mod tests;
