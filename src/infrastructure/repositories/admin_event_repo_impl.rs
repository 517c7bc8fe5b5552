// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::admin_event::{AdminEvent, AdminEventStatus};
use crate::domain::repositories::admin_event_repository::AdminEventRepository;
use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, StoredRecord,
};
use crate::infrastructure::repositories::keys;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

const PARTITION: Partition = Partition::BusinessEntities;

/// 审核事件仓库实现
#[derive(Clone)]
pub struct AdminEventRepositoryImpl {
    store: Arc<dyn PartitionStore>,
}

impl AdminEventRepositoryImpl {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }

    fn record(event: &AdminEvent) -> Result<StoredRecord, RepositoryError> {
        Ok(StoredRecord::encode(
            PARTITION,
            keys::PK_ADMIN_EVENT,
            event.id.to_string(),
            event,
        )?
        .with_indexes(keys::admin_event_indexes(event)))
    }

    async fn query(&self, query: IndexQuery) -> Result<Vec<AdminEvent>, RepositoryError> {
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }
}

#[async_trait]
impl AdminEventRepository for AdminEventRepositoryImpl {
    async fn create(&self, event: &AdminEvent) -> Result<AdminEvent, RepositoryError> {
        if !self.store.put_if_absent(Self::record(event)?).await? {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(event.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminEvent>, RepositoryError> {
        self.store
            .get(PARTITION, keys::PK_ADMIN_EVENT, &id.to_string())
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn update(&self, event: &AdminEvent) -> Result<AdminEvent, RepositoryError> {
        self.store.put(Self::record(event)?).await?;
        Ok(event.clone())
    }

    async fn list_by_status(
        &self,
        status: AdminEventStatus,
        limit: usize,
    ) -> Result<Vec<AdminEvent>, RepositoryError> {
        self.query(
            IndexQuery::new(PARTITION, keys::IDX_EVENT_STATUS, keys::status_hash(status))
                .limit(limit),
        )
        .await
    }

    async fn find_by_url(&self, url: &str) -> Result<Vec<AdminEvent>, RepositoryError> {
        self.query(IndexQuery::new(
            PARTITION,
            keys::IDX_SOURCE_URL,
            keys::url_hash(url),
        ))
        .await
    }

    async fn find_by_dedup_key(&self, key: &str) -> Result<Vec<AdminEvent>, RepositoryError> {
        self.query(IndexQuery::new(
            PARTITION,
            keys::IDX_EVENT_DEDUP,
            keys::dedup_hash(key),
        ))
        .await
    }
}
