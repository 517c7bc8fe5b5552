// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 执行引擎模块
///
/// - `traits`：提取服务客户端抽象与错误分类
/// - `http_extraction`：基于 reqwest 的提取服务客户端
/// - `error_policy`：按域名的错误处理策略
/// - `execution_engine`：并发批量抽取、重试与跨源去重
/// - `task_runner`：到期任务的运行与结果回写
pub mod error_policy;
pub mod execution_engine;
pub mod http_extraction;
pub mod task_runner;
pub mod traits;
