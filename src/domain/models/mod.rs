// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 数据源（source）：提交、分析与抓取配置
/// - 任务（task）：针对单个数据源的一次计划抓取
/// - 执行记录（execution）：一次任务运行的结果
/// - 活动（activity）：审核通过后发布的实体
/// - 审核事件（admin_event）：等待人工审核的原始提取结果
pub mod activity;
pub mod admin_event;
pub mod error;
pub mod execution;
pub mod source;
pub mod task;
