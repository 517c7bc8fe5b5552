// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use harvestrs::utils::errors::WorkerError;
use harvestrs::workers::manager::WorkerManager;
use harvestrs::workers::Worker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};

struct CountingWorker {
    rounds: AtomicUsize,
    fail: bool,
}

impl CountingWorker {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            rounds: AtomicUsize::new(0),
            fail,
        })
    }

    fn rounds(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for CountingWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WorkerError::InternalError("boom".into()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// 让出执行权，使被唤醒的工作器完成当前一轮
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_periodic_worker_runs_every_interval() {
    let worker = CountingWorker::new(false);
    let mut manager = WorkerManager::new();
    manager.spawn_periodic(worker.clone(), Duration::from_secs(60));
    assert_eq!(manager.len(), 1);

    // 第一轮立即执行
    settle().await;
    assert_eq!(worker.rounds(), 1);

    time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(worker.rounds(), 2);

    time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert!(worker.rounds() >= 3);

    manager.shutdown();
    assert!(manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failing_round_does_not_stop_worker() {
    let worker = CountingWorker::new(true);
    let mut manager = WorkerManager::new();
    manager.spawn_periodic(worker.clone(), Duration::from_secs(5));

    settle().await;
    time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(worker.rounds(), 2);

    manager.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_further_rounds() {
    let worker = CountingWorker::new(false);
    let mut manager = WorkerManager::new();
    manager.spawn_periodic(worker.clone(), Duration::from_secs(10));
    settle().await;

    manager.shutdown();
    settle().await;
    let after_shutdown = worker.rounds();

    time::advance(Duration::from_secs(100)).await;
    settle().await;
    assert_eq!(worker.rounds(), after_shutdown);
}

#[tokio::test(start_paused = true)]
async fn test_interval_has_one_second_floor() {
    let worker = CountingWorker::new(false);
    let mut manager = WorkerManager::new();
    manager.spawn_periodic(worker.clone(), Duration::from_millis(10));
    settle().await;

    time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(worker.rounds(), 1);

    time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(worker.rounds(), 2);

    manager.shutdown();
}
