// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use harvestrs::application::state::AppState;
use harvestrs::config::settings::Settings;
use harvestrs::domain::repositories::store::PartitionStore;
use harvestrs::engines::http_extraction::HttpExtractionClient;
use harvestrs::engines::traits::ExtractionClient;
use harvestrs::infrastructure::database::connection;
use harvestrs::infrastructure::metrics::init_metrics;
use harvestrs::infrastructure::store::SeaOrmPartitionStore;
use harvestrs::presentation::routes;
use harvestrs::utils::telemetry;
use harvestrs::workers::analysis_worker::AnalysisWorker;
use harvestrs::workers::batch_worker::BatchWorker;
use harvestrs::workers::expiration_worker::ExpirationWorker;
use harvestrs::workers::manager::WorkerManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// 过期记录清理间隔
const EXPIRATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Arc::new(Settings::new()?);

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.telemetry.json);
    info!("Starting harvestrs {}...", env!("CARGO_PKG_VERSION"));
    init_metrics(&settings.metrics);

    // 3. Connect to database and run migrations
    let db = connection::connect_and_migrate(&settings.database).await?;
    info!("Database connection established");
    let store: Arc<dyn PartitionStore> = Arc::new(SeaOrmPartitionStore::new(Arc::new(db)));

    // 4. Initialize components
    let client: Arc<dyn ExtractionClient> =
        Arc::new(HttpExtractionClient::new(&settings.extraction)?);
    let (state, analysis_signals) = AppState::build(settings.clone(), store.clone(), client);

    // 5. Start workers
    let mut workers = WorkerManager::new();
    workers.track(
        AnalysisWorker::new(
            state.registry.clone(),
            state.analyzer.clone(),
            analysis_signals,
        )
        .start(),
    );
    workers.spawn_periodic(
        Arc::new(BatchWorker::new(state.runner.clone())),
        Duration::from_secs(settings.scheduler.tick_interval_secs),
    );
    workers.spawn_periodic(Arc::new(ExpirationWorker::new(store)), EXPIRATION_INTERVAL);
    info!("{} background worker(s) started", workers.len());

    // 6. Start HTTP server
    let app = routes::routes(state);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { workers.wait_for_shutdown().await })
        .await?;

    Ok(())
}
