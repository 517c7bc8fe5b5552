// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::task_runner::TaskRunner;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// 批处理工作器
///
/// 每轮把所有到期任务交给任务运行器
pub struct BatchWorker {
    runner: Arc<TaskRunner>,
}

impl BatchWorker {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Worker for BatchWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        let summary = self.runner.run_due(Utc::now()).await?;
        debug!(
            "Batch round finished: {} started, {} completed",
            summary.tasks_started, summary.tasks_completed
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "batch"
    }
}
