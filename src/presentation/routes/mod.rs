// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::state::AppState;
use crate::presentation::handlers::{
    activity_handler, batch_handler, review_handler, source_handler,
};
use crate::presentation::middleware::auth_middleware::{admin_auth_middleware, AdminAuth};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// 公开路由无需认证；管理路由在配置了 `server.admin_api_key` 时需要Bearer密钥
///
/// # 参数
///
/// * `state` - 应用共享状态
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version))
        .route("/v1/activities", get(activity_handler::list_activities));

    let admin_routes = Router::new()
        .route(
            "/v1/sources",
            post(source_handler::submit_source).get(source_handler::list_sources),
        )
        .route(
            "/v1/sources/{id}",
            get(source_handler::get_source).delete(source_handler::delete_source),
        )
        .route(
            "/v1/sources/{id}/activate",
            post(source_handler::activate_source),
        )
        .route("/v1/sources/{id}/reject", post(source_handler::reject_source))
        .route(
            "/v1/sources/{id}/analyze",
            post(source_handler::analyze_source),
        )
        .route(
            "/v1/sources/{id}/scrape",
            post(source_handler::trigger_scrape),
        )
        .route("/v1/admin/crawls", post(review_handler::submit_crawl))
        .route("/v1/admin/events", get(review_handler::list_events))
        .route("/v1/admin/events/{id}", get(review_handler::get_event))
        .route(
            "/v1/admin/events/{id}/approve",
            post(review_handler::approve_event),
        )
        .route(
            "/v1/admin/events/{id}/reject",
            post(review_handler::reject_event),
        )
        .route(
            "/v1/admin/events/{id}/edit",
            post(review_handler::edit_event),
        )
        .route("/v1/batches/run", post(batch_handler::run_batch))
        .layer(middleware::from_fn_with_state(
            AdminAuth::new(state.settings.server.admin_api_key.clone()),
            admin_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
