// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, StoredRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

type PrimaryKey = (Partition, String, String);
type IndexBucket = (Partition, String, String);
/// 索引项：(sort_key, pk, sk)
type IndexEntry = (String, String, String);

#[derive(Default)]
struct Inner {
    records: BTreeMap<PrimaryKey, StoredRecord>,
    indexes: HashMap<IndexBucket, BTreeSet<IndexEntry>>,
}

impl Inner {
    fn unindex(&mut self, record: &StoredRecord) {
        for key in &record.index_keys {
            let bucket = (record.partition, key.index.clone(), key.hash_key.clone());
            if let Some(entries) = self.indexes.get_mut(&bucket) {
                entries.remove(&(key.sort_key.clone(), record.pk.clone(), record.sk.clone()));
                if entries.is_empty() {
                    self.indexes.remove(&bucket);
                }
            }
        }
    }

    fn index(&mut self, record: &StoredRecord) {
        for key in &record.index_keys {
            self.indexes
                .entry((record.partition, key.index.clone(), key.hash_key.clone()))
                .or_default()
                .insert((key.sort_key.clone(), record.pk.clone(), record.sk.clone()));
        }
    }

    fn insert(&mut self, record: StoredRecord) {
        let key = (record.partition, record.pk.clone(), record.sk.clone());
        if let Some(old) = self.records.remove(&key) {
            self.unindex(&old);
        }
        self.index(&record);
        self.records.insert(key, record);
    }

    fn remove(&mut self, key: &PrimaryKey) -> Option<StoredRecord> {
        let old = self.records.remove(key)?;
        self.unindex(&old);
        Some(old)
    }
}

/// 内存分区存储
///
/// 有序映射保存记录，二级索引在写入时同步维护，索引查询只访问对应分桶。
/// 用于测试和单机运行。
#[derive(Default)]
pub struct MemoryPartitionStore {
    inner: RwLock<Inner>,
}

impl MemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录数（包括尚未清理的过期记录）
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    async fn put(&self, mut record: StoredRecord) -> Result<(), RepositoryError> {
        record.updated_at = Utc::now();
        self.inner.write().insert(record);
        Ok(())
    }

    async fn put_if_absent(&self, mut record: StoredRecord) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let key = (record.partition, record.pk.clone(), record.sk.clone());
        if let Some(existing) = inner.records.get(&key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        record.updated_at = now;
        inner.insert(record);
        Ok(true)
    }

    async fn get(
        &self,
        partition: Partition,
        pk: &str,
        sk: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError> {
        let now = Utc::now();
        let inner = self.inner.read();
        Ok(inner
            .records
            .get(&(partition, pk.to_string(), sk.to_string()))
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn query_primary(
        &self,
        partition: Partition,
        pk: &str,
    ) -> Result<Vec<StoredRecord>, RepositoryError> {
        let now = Utc::now();
        let inner = self.inner.read();
        let start = (partition, pk.to_string(), String::new());
        Ok(inner
            .records
            .range(start..)
            .take_while(|((p, k, _), _)| *p == partition && k == pk)
            .map(|(_, r)| r)
            .filter(|r| !r.is_expired(now))
            .cloned()
            .collect())
    }

    async fn query_index(&self, query: &IndexQuery) -> Result<Vec<StoredRecord>, RepositoryError> {
        let now = Utc::now();
        let inner = self.inner.read();
        let bucket = (query.partition, query.index.clone(), query.hash_key.clone());
        let Some(entries) = inner.indexes.get(&bucket) else {
            return Ok(Vec::new());
        };

        let iter: Box<dyn Iterator<Item = &IndexEntry>> = if query.descending {
            Box::new(entries.iter().rev())
        } else {
            Box::new(entries.iter())
        };

        let limit = query.limit.unwrap_or(usize::MAX);
        let records = iter
            .filter(|(sort_key, _, _)| {
                query
                    .sort
                    .as_ref()
                    .map(|cond| cond.matches(sort_key))
                    .unwrap_or(true)
            })
            .filter_map(|(_, pk, sk)| {
                inner
                    .records
                    .get(&(query.partition, pk.clone(), sk.clone()))
            })
            .filter(|r| !r.is_expired(now))
            .take(limit)
            .cloned()
            .collect();
        Ok(records)
    }

    async fn delete(
        &self,
        partition: Partition,
        pk: &str,
        sk: &str,
    ) -> Result<bool, RepositoryError> {
        let key = (partition, pk.to_string(), sk.to_string());
        Ok(self.inner.write().remove(&key).is_some())
    }

    async fn purge_expired(
        &self,
        partition: Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.write();
        let expired: Vec<PrimaryKey> = inner
            .records
            .iter()
            .filter(|((p, _, _), r)| *p == partition && r.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        debug!(
            "Purged {} expired records from partition {}",
            expired.len(),
            partition
        );
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::store::{IndexKey, SortCondition};
    use chrono::Duration;
    use serde_json::json;

    fn record(pk: &str, sk: &str, status: &str, sort: &str) -> StoredRecord {
        StoredRecord::encode(
            Partition::ScrapingOperations,
            pk,
            sk,
            &json!({"sk": sk}),
        )
        .unwrap()
        .with_index(IndexKey::new("next_run", format!("STATUS#{}", status), sort))
    }

    #[tokio::test]
    async fn test_put_replaces_index_entries() {
        let store = MemoryPartitionStore::new();
        store.put(record("TASK", "1", "scheduled", "a")).await.unwrap();
        store.put(record("TASK", "1", "completed", "a")).await.unwrap();

        let scheduled = store
            .query_index(&IndexQuery::new(
                Partition::ScrapingOperations,
                "next_run",
                "STATUS#scheduled",
            ))
            .await
            .unwrap();
        assert!(scheduled.is_empty());

        let completed = store
            .query_index(&IndexQuery::new(
                Partition::ScrapingOperations,
                "next_run",
                "STATUS#completed",
            ))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_query_index_orders_and_limits() {
        let store = MemoryPartitionStore::new();
        for (sk, sort) in [("1", "c"), ("2", "a"), ("3", "b")] {
            store.put(record("TASK", sk, "scheduled", sort)).await.unwrap();
        }

        let query = IndexQuery::new(Partition::ScrapingOperations, "next_run", "STATUS#scheduled");
        let ascending = store.query_index(&query).await.unwrap();
        let order: Vec<_> = ascending.iter().map(|r| r.sk.as_str()).collect();
        assert_eq!(order, vec!["2", "3", "1"]);

        let bounded = store
            .query_index(&query.clone().sort(SortCondition::AtMost("b".into())).descending().limit(1))
            .await
            .unwrap();
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].sk, "3");
    }

    #[tokio::test]
    async fn test_put_if_absent_and_expiry() {
        let store = MemoryPartitionStore::new();
        let past = Utc::now() - Duration::seconds(5);

        assert!(store.put_if_absent(record("PENDING", "s#t", "x", "1")).await.unwrap());
        assert!(!store.put_if_absent(record("PENDING", "s#t", "x", "2")).await.unwrap());

        store
            .put(record("TASK", "old", "scheduled", "z").expires_at(past))
            .await
            .unwrap();
        assert!(store
            .get(Partition::ScrapingOperations, "TASK", "old")
            .await
            .unwrap()
            .is_none());

        // 过期记录可以被条件写入覆盖
        assert!(store.put_if_absent(record("TASK", "old", "scheduled", "z")).await.unwrap());
        store
            .put(record("TASK", "gone", "scheduled", "y").expires_at(past))
            .await
            .unwrap();

        let purged = store
            .purge_expired(Partition::ScrapingOperations, Utc::now())
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_query_primary_stays_within_pk() {
        let store = MemoryPartitionStore::new();
        store.put(record("SOURCE#1", "ANALYSIS", "x", "1")).await.unwrap();
        store.put(record("SOURCE#1", "CONFIG", "x", "1")).await.unwrap();
        store.put(record("SOURCE#2", "ANALYSIS", "x", "1")).await.unwrap();

        let records = store
            .query_primary(Partition::ScrapingOperations, "SOURCE#1")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sk, "ANALYSIS");
        assert!(store.delete(Partition::ScrapingOperations, "SOURCE#1", "CONFIG").await.unwrap());
        assert!(!store.delete(Partition::ScrapingOperations, "SOURCE#1", "CONFIG").await.unwrap());
    }
}
