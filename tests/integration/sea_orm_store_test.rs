// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{Duration, Utc};
use harvestrs::config::settings::DatabaseSettings;
use harvestrs::domain::models::source::{Source, SourceStatus, SourceSubmission, SourceType};
use harvestrs::domain::models::task::Priority;
use harvestrs::domain::repositories::source_repository::SourceRepository;
use harvestrs::domain::repositories::store::{
    IndexKey, IndexQuery, Partition, PartitionStore, SortCondition, StoredRecord,
};
use harvestrs::infrastructure::database::connection;
use harvestrs::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use harvestrs::infrastructure::store::SeaOrmPartitionStore;
use serde_json::{json, Value};
use std::sync::Arc;

async fn sqlite_store() -> Arc<dyn PartitionStore> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let db = connection::connect_and_migrate(&settings)
        .await
        .expect("in-memory sqlite should migrate");
    Arc::new(SeaOrmPartitionStore::new(Arc::new(db)))
}

fn task_record(id: &str, status: &str, at: &str) -> StoredRecord {
    StoredRecord::encode(
        Partition::ScrapingOperations,
        format!("TASK#{}", id),
        "META",
        &json!({ "id": id, "status": status }),
    )
    .unwrap()
    .with_index(IndexKey::new("status_time", format!("STATUS#{}", status), at))
}

#[tokio::test]
async fn test_put_get_and_overwrite() {
    let store = sqlite_store().await;

    store.put(task_record("1", "pending", "2025-06-01")).await.unwrap();
    let stored = store
        .get(Partition::ScrapingOperations, "TASK#1", "META")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.decode::<Value>().unwrap()["status"], "pending");

    // 覆盖写入同时替换索引键
    store.put(task_record("1", "running", "2025-06-01")).await.unwrap();
    let pending = store
        .query_index(&IndexQuery::new(
            Partition::ScrapingOperations,
            "status_time",
            "STATUS#pending",
        ))
        .await
        .unwrap();
    assert!(pending.is_empty());
    let running = store
        .query_index(&IndexQuery::new(
            Partition::ScrapingOperations,
            "status_time",
            "STATUS#running",
        ))
        .await
        .unwrap();
    assert_eq!(running.len(), 1);

    // 分区之间互相隔离
    assert!(store
        .get(Partition::BusinessEntities, "TASK#1", "META")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_query_index_sorts_filters_and_limits() {
    let store = sqlite_store().await;
    for (id, at) in [("a", "2025-06-03"), ("b", "2025-06-01"), ("c", "2025-06-02")] {
        store.put(task_record(id, "pending", at)).await.unwrap();
    }

    let ascending = store
        .query_index(&IndexQuery::new(
            Partition::ScrapingOperations,
            "status_time",
            "STATUS#pending",
        ))
        .await
        .unwrap();
    let ids: Vec<String> = ascending
        .iter()
        .map(|r| r.decode::<Value>().unwrap()["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["b", "c", "a"]);

    let due = store
        .query_index(
            &IndexQuery::new(Partition::ScrapingOperations, "status_time", "STATUS#pending")
                .sort(SortCondition::AtMost("2025-06-02".into()))
                .descending()
                .limit(1),
        )
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].pk, "TASK#c");
}

#[tokio::test]
async fn test_put_if_absent_respects_live_records_only() {
    let store = sqlite_store().await;
    let now = Utc::now();

    let first = task_record("1", "pending", "x").expires_at(now + Duration::hours(1));
    assert!(store.put_if_absent(first).await.unwrap());
    assert!(!store
        .put_if_absent(task_record("1", "running", "x"))
        .await
        .unwrap());

    let expired = task_record("2", "pending", "x").expires_at(now - Duration::hours(1));
    store.put(expired).await.unwrap();
    assert!(store
        .put_if_absent(task_record("2", "running", "x"))
        .await
        .unwrap());
    let replaced = store
        .get(Partition::ScrapingOperations, "TASK#2", "META")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced.decode::<Value>().unwrap()["status"], "running");
}

#[tokio::test]
async fn test_query_primary_delete_and_purge() {
    let store = sqlite_store().await;
    let now = Utc::now();

    for sk in ["META", "EXEC#1", "EXEC#2"] {
        let record = StoredRecord::encode(
            Partition::ScrapingOperations,
            "TASK#1",
            sk,
            &json!({ "sk": sk }),
        )
        .unwrap();
        let record = if sk == "EXEC#1" {
            record.expires_at(now - Duration::minutes(5))
        } else {
            record
        };
        store.put(record).await.unwrap();
    }

    let all = store
        .query_primary(Partition::ScrapingOperations, "TASK#1")
        .await
        .unwrap();
    // 过期记录在清理前就不可见
    let sks: Vec<&str> = all.iter().map(|r| r.sk.as_str()).collect();
    assert_eq!(sks, vec!["EXEC#2", "META"]);

    let purged = store
        .purge_expired(Partition::ScrapingOperations, now)
        .await
        .unwrap();
    assert_eq!(purged, 1);

    assert!(store
        .delete(Partition::ScrapingOperations, "TASK#1", "EXEC#2")
        .await
        .unwrap());
    assert!(!store
        .delete(Partition::ScrapingOperations, "TASK#1", "EXEC#2")
        .await
        .unwrap());
    assert_eq!(
        store
            .query_primary(Partition::ScrapingOperations, "TASK#1")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_source_repository_over_sqlite() {
    let store = sqlite_store().await;
    let repo = SourceRepositoryImpl::new(store);

    let mut source = Source::new(SourceSubmission {
        name: "Riverside Library".into(),
        base_url: "https://library.example".into(),
        source_type: SourceType::EventCalendar,
        priority: Priority::High,
        expected_content: vec!["events".into()],
        hint_urls: vec![],
        submitted_by: "founder".into(),
    });
    repo.create(&source).await.unwrap();

    let found = repo
        .find_by_url("https://www.library.example/")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, source.id);
    assert_eq!(repo.find_by_domain("library.example").await.unwrap().len(), 1);

    source.transition(SourceStatus::Analyzing).unwrap();
    repo.update(&source).await.unwrap();
    assert!(repo
        .list_by_status(SourceStatus::PendingAnalysis, 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        repo.list_by_status(SourceStatus::Analyzing, 10)
            .await
            .unwrap()
            .len(),
        1
    );

    let removed = repo.delete_all(source.id).await.unwrap();
    assert!(removed >= 1);
    assert!(repo.find_by_id(source.id).await.unwrap().is_none());
}
