// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// - `batch_worker`：定时运行到期任务
/// - `analysis_worker`：消费分析信号
/// - `expiration_worker`：清理过期的运营记录
/// - `manager`：后台工作器的生命周期管理
pub mod analysis_worker;
pub mod batch_worker;
pub mod expiration_worker;
pub mod manager;
pub mod worker;

pub use worker::Worker;
