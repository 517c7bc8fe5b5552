// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 数据源注册（source_registry）：提交、分析、激活、拒绝与删除
/// - 数据源分析（source_analyzer）：抽样页面并给出抓取配置建议
/// - 审核流程（review_service）：管理员抓取、审核事件与批准发布
/// - 转换（conversion_service）：原始提取数据到活动记录的映射
/// - 质量评分（quality_scorer）与去重（deduplicator）
pub mod conversion_service;
pub mod deduplicator;
pub mod quality_scorer;
pub mod review_service;
pub mod source_analyzer;
pub mod source_registry;
