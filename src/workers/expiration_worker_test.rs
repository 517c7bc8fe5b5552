// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::repositories::store::StoredRecord;
use crate::infrastructure::store::MemoryPartitionStore;
use chrono::Duration;
use serde_json::json;

fn record(partition: Partition, pk: &str, sk: &str, expires_in: Duration) -> StoredRecord {
    StoredRecord::encode(partition, pk, sk, &json!({ "id": sk }))
        .unwrap()
        .expires_at(Utc::now() + expires_in)
}

#[tokio::test]
async fn test_purges_only_expired_operational_records() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitionStore::new());
    let ops = Partition::ScrapingOperations;
    store
        .put(record(ops, "TASK", "old-1", Duration::hours(-2)))
        .await
        .unwrap();
    store
        .put(record(ops, "EXECUTION", "old-2", Duration::minutes(-1)))
        .await
        .unwrap();
    store
        .put(record(ops, "TASK", "live", Duration::days(1)))
        .await
        .unwrap();
    store
        .put(record(
            Partition::BusinessEntities,
            "ACTIVITY",
            "kept",
            Duration::hours(-1),
        ))
        .await
        .unwrap();

    let worker = ExpirationWorker::new(store.clone());
    worker.run().await.unwrap();

    assert_eq!(store.purge_expired(ops, Utc::now()).await.unwrap(), 0);
    assert!(store.get(ops, "TASK", "live").await.unwrap().is_some());
    assert_eq!(
        store
            .purge_expired(Partition::BusinessEntities, Utc::now())
            .await
            .unwrap(),
        1
    );
    assert_eq!(worker.name(), "expiration");
}
