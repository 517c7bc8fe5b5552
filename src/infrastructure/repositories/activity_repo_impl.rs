// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::activity::Activity;
use crate::domain::repositories::activity_repository::{
    ActivityPage, ActivityQuery, ActivityRepository,
};
use crate::domain::repositories::store::{
    IndexQuery, Partition, PartitionStore, RepositoryError, SortCondition, StoredRecord,
};
use crate::infrastructure::repositories::keys;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const PARTITION: Partition = Partition::BusinessEntities;

/// 去重键占用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DedupClaim {
    activity_id: Uuid,
}

/// 活动仓库实现
///
/// 写入活动前先以条件写入占用 `DEDUP/{key}`，保证已发布活动的去重键唯一
#[derive(Clone)]
pub struct ActivityRepositoryImpl {
    store: Arc<dyn PartitionStore>,
}

impl ActivityRepositoryImpl {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self { store }
    }

    async fn query(&self, query: IndexQuery) -> Result<Vec<Activity>, RepositoryError> {
        self.store
            .query_index(&query)
            .await?
            .iter()
            .map(StoredRecord::decode)
            .collect()
    }

    async fn claim_holder(&self, key: &str) -> Result<Option<Uuid>, RepositoryError> {
        Ok(self
            .store
            .get(PARTITION, keys::PK_DEDUP, key)
            .await?
            .map(|r| r.decode::<DedupClaim>())
            .transpose()?
            .map(|c| c.activity_id))
    }
}

#[async_trait]
impl ActivityRepository for ActivityRepositoryImpl {
    async fn create(&self, activity: &Activity) -> Result<Activity, RepositoryError> {
        let key = activity.dedup_key();
        let claim = StoredRecord::encode(
            PARTITION,
            keys::PK_DEDUP,
            key.clone(),
            &DedupClaim {
                activity_id: activity.id,
            },
        )?;
        if !self.store.put_if_absent(claim).await? {
            return Err(RepositoryError::AlreadyExists);
        }

        let record = StoredRecord::encode(
            PARTITION,
            keys::PK_ACTIVITY,
            activity.id.to_string(),
            activity,
        )?
        .with_indexes(keys::activity_indexes(activity));
        if let Err(e) = self.store.put(record).await {
            // 活动没有写入，释放去重键
            if let Err(release) = self.store.delete(PARTITION, keys::PK_DEDUP, &key).await {
                warn!("Failed to release dedup key {}: {}", key, release);
            }
            return Err(e);
        }
        Ok(activity.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Activity>, RepositoryError> {
        self.store
            .get(PARTITION, keys::PK_ACTIVITY, &id.to_string())
            .await?
            .map(|r| r.decode())
            .transpose()
    }

    async fn exists_by_dedup_key(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self.claim_holder(key).await?.is_some())
    }

    async fn list(&self, query: &ActivityQuery) -> Result<ActivityPage, RepositoryError> {
        let index_query = match query.category.as_deref() {
            Some(category) => {
                IndexQuery::new(PARTITION, keys::IDX_CATEGORY, keys::category_hash(category))
            }
            None => IndexQuery::new(PARTITION, keys::IDX_UPDATED, keys::PK_ACTIVITY),
        };
        let index_query = match query.updated_since {
            Some(since) => index_query.sort(SortCondition::AtLeast(keys::time_key(since))),
            None => index_query,
        }
        .descending();

        let matching: Vec<Activity> = self
            .query(index_query)
            .await?
            .into_iter()
            .filter(|a| match query.date_from {
                Some(from) => a.start_date.map(|d| d >= from).unwrap_or(false),
                None => true,
            })
            .collect();

        let total = matching.len() as u64;
        let last_updated = matching.iter().map(|a| a.updated_at).max();
        let activities = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok(ActivityPage {
            activities,
            total,
            last_updated,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let Some(activity) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        let removed = self
            .store
            .delete(PARTITION, keys::PK_ACTIVITY, &id.to_string())
            .await?;
        let key = activity.dedup_key();
        if self.claim_holder(&key).await? == Some(id) {
            self.store.delete(PARTITION, keys::PK_DEDUP, &key).await?;
        }
        Ok(removed)
    }

    async fn find_by_location_date(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Vec<Activity>, RepositoryError> {
        self.query(
            IndexQuery::new(
                PARTITION,
                keys::IDX_LOCATION_DATE,
                keys::location_hash(location),
            )
            .sort(SortCondition::Prefix(format!("{}#", date))),
        )
        .await
    }

    async fn find_by_category_age(
        &self,
        category: &str,
        age_group: &str,
    ) -> Result<Vec<Activity>, RepositoryError> {
        self.query(IndexQuery::new(
            PARTITION,
            keys::IDX_CATEGORY_AGE,
            keys::category_age_hash(category, age_group),
        ))
        .await
    }

    async fn find_by_venue(&self, venue_id: Uuid) -> Result<Vec<Activity>, RepositoryError> {
        self.query(IndexQuery::new(
            PARTITION,
            keys::IDX_VENUE,
            keys::venue_hash(venue_id),
        ))
        .await
    }

    async fn find_by_provider(&self, provider: &str) -> Result<Vec<Activity>, RepositoryError> {
        self.query(IndexQuery::new(
            PARTITION,
            keys::IDX_PROVIDER,
            keys::provider_hash(provider),
        ))
        .await
    }
}
