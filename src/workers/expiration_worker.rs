// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::store::{Partition, PartitionStore};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// 过期记录清理工作器
///
/// 定期删除抓取运营分区中已过期的任务、执行记录和槽位。
/// 过期记录在清理前对读取已不可见，清理只回收空间
pub struct ExpirationWorker {
    store: Arc<dyn PartitionStore>,
}

impl ExpirationWorker {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Worker for ExpirationWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        let count = self
            .store
            .purge_expired(Partition::ScrapingOperations, Utc::now())
            .await?;
        if count > 0 {
            info!("Cleaned up {} expired operational record(s)", count);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "expiration"
    }
}

#[cfg(test)]
#[path = "expiration_worker_test.rs"]
mod tests;
