// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 任务调度、到期任务选取与自适应抓取频率
pub mod frequency;
pub mod scheduler;
