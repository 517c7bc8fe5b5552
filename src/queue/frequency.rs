// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::execution::{Execution, ExecutionOutcome};
use std::collections::HashSet;

/// 频率调整方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyAdjustment {
    /// 可靠且内容稳定，放宽间隔
    Widened,
    /// 出现失败或内容变动，收紧间隔
    Narrowed,
    Unchanged,
}

/// 自适应频率计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyDecision {
    pub hours: u32,
    pub adjustment: FrequencyAdjustment,
}

/// 根据最近的执行记录计算新的抓取间隔
///
/// # 参数
///
/// * `current_hours` - 当前间隔（小时）
/// * `reliability_score` - 数据源的可靠性分数
/// * `recent` - 最近的执行记录，新的在前
/// * `settings` - 调度器配置
///
/// # 返回值
///
/// 限制在 `[min_frequency_hours, max_frequency_hours]` 内的新间隔
pub fn adapt_frequency(
    current_hours: u32,
    reliability_score: f64,
    recent: &[Execution],
    settings: &SchedulerSettings,
) -> FrequencyDecision {
    let window: Vec<&Execution> = recent
        .iter()
        .filter(|e| e.is_finalized())
        .take(settings.stability_window.max(1))
        .collect();

    let failures = window
        .iter()
        .filter(|e| e.outcome == ExecutionOutcome::Failed)
        .count();
    let hashes: HashSet<&str> = window
        .iter()
        .filter(|e| e.outcome == ExecutionOutcome::Succeeded)
        .filter_map(|e| e.content_hash.as_deref())
        .collect();
    let churn = hashes.len() > 1;
    let stable = window.len() >= 2 && failures == 0 && hashes.len() == 1;

    let (hours, adjustment) = if failures > 0 || churn {
        (
            scale(current_hours, settings.narrow_factor),
            FrequencyAdjustment::Narrowed,
        )
    } else if stable && reliability_score >= settings.reliability_threshold {
        (
            scale(current_hours, settings.widen_factor),
            FrequencyAdjustment::Widened,
        )
    } else {
        (current_hours, FrequencyAdjustment::Unchanged)
    };

    let bounded = hours.clamp(
        settings.min_frequency_hours,
        settings.max_frequency_hours.max(settings.min_frequency_hours),
    );
    let adjustment = if bounded == current_hours {
        FrequencyAdjustment::Unchanged
    } else {
        adjustment
    };
    FrequencyDecision {
        hours: bounded,
        adjustment,
    }
}

fn scale(hours: u32, factor: f64) -> u32 {
    let scaled = (hours.max(1) as f64 * factor).round();
    if scaled < 1.0 {
        1
    } else if scaled > u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}
