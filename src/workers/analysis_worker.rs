// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::source_analyzer::SourceAnalyzer;
use crate::domain::services::source_registry::SourceRegistry;
use crate::utils::errors::WorkerError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// 数据源分析工作器
///
/// 消费分析信号：`pending_analysis → analyzing`，运行分析并保存结果。
/// 信号通道关闭后退出
pub struct AnalysisWorker {
    registry: Arc<SourceRegistry>,
    analyzer: Arc<SourceAnalyzer>,
    signals: mpsc::Receiver<Uuid>,
}

impl AnalysisWorker {
    pub fn new(
        registry: Arc<SourceRegistry>,
        analyzer: Arc<SourceAnalyzer>,
        signals: mpsc::Receiver<Uuid>,
    ) -> Self {
        Self {
            registry,
            analyzer,
            signals,
        }
    }

    /// 分析单个数据源
    ///
    /// 不处于可分析状态的数据源直接跳过
    pub async fn process(&self, source_id: Uuid) -> Result<(), WorkerError> {
        let Some(source) = self.registry.begin_analysis(source_id).await? else {
            return Ok(());
        };
        let analysis = self.analyzer.analyze(&source).await;
        let source = self.registry.record_analysis(analysis).await?;
        debug!("Source {} is now {}", source.id, source.status);
        Ok(())
    }

    /// 启动后台运行
    pub fn start(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Analysis worker started");
            while let Some(source_id) = self.signals.recv().await {
                if let Err(e) = self.process(source_id).await {
                    error!("Analysis of source {} failed: {}", source_id, e);
                }
            }
            info!("Analysis channel closed; analysis worker stopped");
        })
    }
}
