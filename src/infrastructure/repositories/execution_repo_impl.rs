// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::execution::Execution;
use crate::domain::repositories::execution_repository::ExecutionRepository;
use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, StoredRecord,
};
use crate::infrastructure::repositories::keys;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

const PARTITION: Partition = Partition::ScrapingOperations;

/// 执行记录仓库实现
#[derive(Clone)]
pub struct ExecutionRepositoryImpl {
    store: Arc<dyn PartitionStore>,
}

impl ExecutionRepositoryImpl {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }

    fn record(execution: &Execution) -> Result<StoredRecord, RepositoryError> {
        Ok(StoredRecord::encode(
            PARTITION,
            keys::PK_EXECUTION,
            execution.id.to_string(),
            execution,
        )?
        .with_indexes(keys::execution_indexes(execution))
        .expires_at(execution.expires_at))
    }
}

#[async_trait]
impl ExecutionRepository for ExecutionRepositoryImpl {
    async fn create(&self, execution: &Execution) -> Result<Execution, RepositoryError> {
        if !self.store.put_if_absent(Self::record(execution)?).await? {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(execution.clone())
    }

    async fn update(&self, execution: &Execution) -> Result<Execution, RepositoryError> {
        self.store.put(Self::record(execution)?).await?;
        Ok(execution.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Execution>, RepositoryError> {
        self.store
            .get(PARTITION, keys::PK_EXECUTION, &id.to_string())
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn recent_for_source(
        &self,
        source_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Execution>, RepositoryError> {
        let query = IndexQuery::new(
            PARTITION,
            keys::IDX_SOURCE_EXECUTIONS,
            keys::source_hash(source_id),
        )
        .descending()
        .limit(limit);
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }
}
