// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source::{Source, SourceAnalysis, SourceConfig, SourceStatus};
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, StoredRecord,
};
use crate::infrastructure::repositories::keys;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

const PARTITION: Partition = Partition::SourceManagement;

/// 数据源仓库实现
///
/// 每个数据源在 Source Management 分区下有 `SUBMISSION`、`ANALYSIS`、`CONFIG` 三条记录
#[derive(Clone)]
pub struct SourceRepositoryImpl {
    store: Arc<dyn PartitionStore>,
}

impl SourceRepositoryImpl {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }

    fn submission_record(source: &Source) -> Result<StoredRecord, RepositoryError> {
        Ok(StoredRecord::encode(
            PARTITION,
            keys::source_pk(source.id),
            keys::SK_SUBMISSION,
            source,
        )?
        .with_indexes(keys::source_indexes(source)))
    }

    fn config_record(config: &SourceConfig) -> Result<StoredRecord, RepositoryError> {
        Ok(StoredRecord::encode(
            PARTITION,
            keys::source_pk(config.source_id),
            keys::SK_CONFIG,
            config,
        )?
        .with_indexes(keys::config_indexes(config)))
    }

    async fn query_sources(&self, query: IndexQuery) -> Result<Vec<Source>, RepositoryError> {
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }
}

#[async_trait]
impl SourceRepository for SourceRepositoryImpl {
    async fn create(&self, source: &Source) -> Result<Source, RepositoryError> {
        if !self
            .store
            .put_if_absent(Self::submission_record(source)?)
            .await?
        {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(source.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>, RepositoryError> {
        self.store
            .get(PARTITION, &keys::source_pk(id), keys::SK_SUBMISSION)
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn update(&self, source: &Source) -> Result<Source, RepositoryError> {
        self.store.put(Self::submission_record(source)?).await?;
        Ok(source.clone())
    }

    async fn list_by_status(
        &self,
        status: SourceStatus,
        limit: usize,
    ) -> Result<Vec<Source>, RepositoryError> {
        self.query_sources(
            IndexQuery::new(PARTITION, keys::IDX_STATUS_PRIORITY, keys::status_hash(status))
                .limit(limit),
        )
        .await
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Source>, RepositoryError> {
        Ok(self
            .query_sources(
                IndexQuery::new(PARTITION, keys::IDX_BASE_URL, keys::url_hash(url)).limit(1),
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Vec<Source>, RepositoryError> {
        self.query_sources(IndexQuery::new(
            PARTITION,
            keys::IDX_DOMAIN,
            keys::domain_hash(domain),
        ))
        .await
    }

    async fn save_analysis(&self, analysis: &SourceAnalysis) -> Result<(), RepositoryError> {
        let record = StoredRecord::encode(
            PARTITION,
            keys::source_pk(analysis.source_id),
            keys::SK_ANALYSIS,
            analysis,
        )?;
        self.store.put(record).await
    }

    async fn find_analysis(
        &self,
        source_id: Uuid,
    ) -> Result<Option<SourceAnalysis>, RepositoryError> {
        self.store
            .get(PARTITION, &keys::source_pk(source_id), keys::SK_ANALYSIS)
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn create_config(&self, config: &SourceConfig) -> Result<(), RepositoryError> {
        if !self.store.put_if_absent(Self::config_record(config)?).await? {
            return Err(RepositoryError::AlreadyExists);
        }
        Ok(())
    }

    async fn update_config(&self, config: &SourceConfig) -> Result<(), RepositoryError> {
        self.store.put(Self::config_record(config)?).await
    }

    async fn find_config(&self, source_id: Uuid) -> Result<Option<SourceConfig>, RepositoryError> {
        self.store
            .get(PARTITION, &keys::source_pk(source_id), keys::SK_CONFIG)
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn list_enabled_configs(&self) -> Result<Vec<SourceConfig>, RepositoryError> {
        self.store
            .query_index(&IndexQuery::new(
                PARTITION,
                keys::IDX_CONFIG_ENABLED,
                keys::enabled_hash(true),
            ))
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    async fn delete_all(&self, source_id: Uuid) -> Result<u64, RepositoryError> {
        let pk = keys::source_pk(source_id);
        let mut removed = 0;
        for record in self.store.query_primary(PARTITION, &pk).await? {
            if self.store.delete(PARTITION, &pk, &record.sk).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
