// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// 工作管理器
///
/// 持有所有后台工作器的句柄，负责定时驱动与关闭
#[derive(Default)]
pub struct WorkerManager {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按固定间隔驱动一个工作器
    ///
    /// 第一轮立即执行；单轮失败只记录日志，不会停止循环
    ///
    /// # 参数
    ///
    /// * `worker` - 工作器
    /// * `every` - 两轮之间的间隔
    pub fn spawn_periodic(&mut self, worker: Arc<dyn Worker>, every: Duration) {
        let every = every.max(Duration::from_secs(1));
        let handle = tokio::spawn(async move {
            info!("{} worker started (every {:?})", worker.name(), every);
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = worker.run().await {
                    error!("{} worker round failed: {}", worker.name(), e);
                }
            }
        });
        self.handles.push(handle);
    }

    /// 托管一个自行驱动的工作器
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 中止所有工作器
    pub fn shutdown(&mut self) {
        info!("Shutting down {} worker(s)...", self.handles.len());
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown();
        info!("Workers shut down successfully");
    }
}
