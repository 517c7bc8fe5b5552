// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装Prometheus导出器并注册各类监控指标。地址被占用等安装失败只记录警告，
/// 指标宏在没有记录器时不做任何事
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                "Invalid metrics listen address {}: {}",
                settings.listen_addr, e
            );
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("sources_submitted_total", "Sources submitted for analysis");
    describe_counter!("sources_activated_total", "Sources activated by an admin");
    describe_counter!("tasks_scheduled_total", "Scraping tasks created");
    describe_counter!(
        "tasks_reused_total",
        "Scheduling calls that reused an existing pending task"
    );
    describe_counter!(
        "extraction_attempts_total",
        "Extraction attempts by outcome (success, retryable, terminal)"
    );
    describe_counter!(
        "batch_sources_total",
        "Sources processed by batches by result (success, failure)"
    );
    describe_histogram!("batch_duration_seconds", "Wall-clock duration of a batch");
    describe_counter!(
        "duplicates_removed_total",
        "Candidates dropped by batch deduplication"
    );
    describe_counter!(
        "admin_events_total",
        "Admin review transitions by resulting status"
    );
}
