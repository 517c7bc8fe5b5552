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

use crate::domain::repositories::store::{
    IndexKey, IndexQuery, Partition, PartitionStore, RepositoryError, SortCondition, StoredRecord,
};
use crate::infrastructure::database::entities::{partition_index_entry, partition_record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 基于SeaORM的分区存储
///
/// `partition_records` 保存记录，`partition_index_entries` 保存二级索引项，
/// 两张表在同一个事务中维护
#[derive(Clone)]
pub struct SeaOrmPartitionStore {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SeaOrmPartitionStore {
    /// 创建新的分区存储实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn not_expired(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(partition_record::Column::ExpiresAt.is_null())
        .add(partition_record::Column::ExpiresAt.gt(now))
}

fn to_record(model: partition_record::Model) -> Result<StoredRecord, RepositoryError> {
    Ok(StoredRecord {
        partition: model.partition.parse()?,
        pk: model.pk,
        sk: model.sk,
        data: model.data,
        index_keys: Vec::new(),
        expires_at: model.expires_at,
        updated_at: model.updated_at,
    })
}

fn to_active(record: &StoredRecord) -> partition_record::ActiveModel {
    partition_record::ActiveModel {
        partition: Set(record.partition.to_string()),
        pk: Set(record.pk.clone()),
        sk: Set(record.sk.clone()),
        data: Set(record.data.clone()),
        expires_at: Set(record.expires_at),
        updated_at: Set(record.updated_at),
    }
}

fn index_entries(record: &StoredRecord) -> Vec<partition_index_entry::ActiveModel> {
    record
        .index_keys
        .iter()
        .map(|key| partition_index_entry::ActiveModel {
            partition: Set(record.partition.to_string()),
            index_name: Set(key.index.clone()),
            hash_key: Set(key.hash_key.clone()),
            sort_key: Set(key.sort_key.clone()),
            pk: Set(record.pk.clone()),
            sk: Set(record.sk.clone()),
            ..Default::default()
        })
        .collect()
}

async fn delete_record<C: ConnectionTrait>(
    conn: &C,
    partition: Partition,
    pk: &str,
    sk: &str,
) -> Result<bool, RepositoryError> {
    partition_index_entry::Entity::delete_many()
        .filter(partition_index_entry::Column::Partition.eq(partition.to_string()))
        .filter(partition_index_entry::Column::Pk.eq(pk))
        .filter(partition_index_entry::Column::Sk.eq(sk))
        .exec(conn)
        .await?;
    let result = partition_record::Entity::delete_many()
        .filter(partition_record::Column::Partition.eq(partition.to_string()))
        .filter(partition_record::Column::Pk.eq(pk))
        .filter(partition_record::Column::Sk.eq(sk))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

async fn insert_indexes<C: ConnectionTrait>(
    conn: &C,
    record: &StoredRecord,
) -> Result<(), RepositoryError> {
    let entries = index_entries(record);
    if !entries.is_empty() {
        partition_index_entry::Entity::insert_many(entries)
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// 加载记录对应的索引键
async fn load_index_keys<C: ConnectionTrait>(
    conn: &C,
    record: &mut StoredRecord,
) -> Result<(), RepositoryError> {
    let entries = partition_index_entry::Entity::find()
        .filter(partition_index_entry::Column::Partition.eq(record.partition.to_string()))
        .filter(partition_index_entry::Column::Pk.eq(record.pk.as_str()))
        .filter(partition_index_entry::Column::Sk.eq(record.sk.as_str()))
        .order_by_asc(partition_index_entry::Column::Id)
        .all(conn)
        .await?;
    record.index_keys = entries
        .into_iter()
        .map(|e| IndexKey::new(e.index_name, e.hash_key, e.sort_key))
        .collect();
    Ok(())
}

#[async_trait]
impl PartitionStore for SeaOrmPartitionStore {
    async fn put(&self, mut record: StoredRecord) -> Result<(), RepositoryError> {
        record.updated_at = Utc::now();
        let txn = self.db.begin().await?;
        delete_record(&txn, record.partition, &record.pk, &record.sk).await?;
        to_active(&record).insert(&txn).await?;
        insert_indexes(&txn, &record).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn put_if_absent(&self, mut record: StoredRecord) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        record.updated_at = now;
        let txn = self.db.begin().await?;

        let existing = partition_record::Entity::find_by_id((
            record.partition.to_string(),
            record.pk.clone(),
            record.sk.clone(),
        ))
        .one(&txn)
        .await?;
        if let Some(existing) = existing {
            if existing.expires_at.map(|at| at > now).unwrap_or(true) {
                txn.rollback().await?;
                return Ok(false);
            }
            delete_record(&txn, record.partition, &record.pk, &record.sk).await?;
        }

        match to_active(&record).insert(&txn).await {
            Ok(_) => {}
            Err(err) => {
                // 并发写入者先提交了同一主键
                if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
                    txn.rollback().await?;
                    return Ok(false);
                }
                return Err(err.into());
            }
        }
        insert_indexes(&txn, &record).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn get(
        &self,
        partition: Partition,
        pk: &str,
        sk: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError> {
        let model = partition_record::Entity::find()
            .filter(partition_record::Column::Partition.eq(partition.to_string()))
            .filter(partition_record::Column::Pk.eq(pk))
            .filter(partition_record::Column::Sk.eq(sk))
            .filter(not_expired(Utc::now()))
            .one(self.db.as_ref())
            .await?;
        match model {
            Some(model) => {
                let mut record = to_record(model)?;
                load_index_keys(self.db.as_ref(), &mut record).await?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn query_primary(
        &self,
        partition: Partition,
        pk: &str,
    ) -> Result<Vec<StoredRecord>, RepositoryError> {
        let models = partition_record::Entity::find()
            .filter(partition_record::Column::Partition.eq(partition.to_string()))
            .filter(partition_record::Column::Pk.eq(pk))
            .filter(not_expired(Utc::now()))
            .order_by_asc(partition_record::Column::Sk)
            .all(self.db.as_ref())
            .await?;
        models.into_iter().map(to_record).collect()
    }

    async fn query_index(&self, query: &IndexQuery) -> Result<Vec<StoredRecord>, RepositoryError> {
        let now = Utc::now();
        let mut select = partition_index_entry::Entity::find()
            .filter(partition_index_entry::Column::Partition.eq(query.partition.to_string()))
            .filter(partition_index_entry::Column::IndexName.eq(query.index.as_str()))
            .filter(partition_index_entry::Column::HashKey.eq(query.hash_key.as_str()));

        select = match &query.sort {
            Some(SortCondition::Prefix(prefix)) => {
                select.filter(partition_index_entry::Column::SortKey.starts_with(prefix.as_str()))
            }
            Some(SortCondition::AtMost(max)) => {
                select.filter(partition_index_entry::Column::SortKey.lte(max.as_str()))
            }
            Some(SortCondition::AtLeast(min)) => {
                select.filter(partition_index_entry::Column::SortKey.gte(min.as_str()))
            }
            Some(SortCondition::Between(min, max)) => select.filter(
                partition_index_entry::Column::SortKey.between(min.as_str(), max.as_str()),
            ),
            None => select,
        };

        select = if query.descending {
            select.order_by_desc(partition_index_entry::Column::SortKey)
        } else {
            select.order_by_asc(partition_index_entry::Column::SortKey)
        };

        let entries = select.all(self.db.as_ref()).await?;
        let limit = query.limit.unwrap_or(usize::MAX);

        let mut keys = Vec::new();
        let mut position = HashMap::new();
        for entry in &entries {
            let key = (entry.pk.clone(), entry.sk.clone());
            if !position.contains_key(&key) {
                position.insert(key.clone(), keys.len());
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // 一次取回所有命中的记录，再按索引顺序排列
        let mut condition = Condition::any();
        for (pk, sk) in &keys {
            condition = condition.add(
                Condition::all()
                    .add(partition_record::Column::Pk.eq(pk.as_str()))
                    .add(partition_record::Column::Sk.eq(sk.as_str())),
            );
        }
        let models = partition_record::Entity::find()
            .filter(partition_record::Column::Partition.eq(query.partition.to_string()))
            .filter(condition)
            .filter(not_expired(now))
            .all(self.db.as_ref())
            .await?;

        let mut records = models
            .into_iter()
            .map(to_record)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| {
            position
                .get(&(r.pk.clone(), r.sk.clone()))
                .copied()
                .unwrap_or(usize::MAX)
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn delete(
        &self,
        partition: Partition,
        pk: &str,
        sk: &str,
    ) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;
        let removed = delete_record(&txn, partition, pk, sk).await?;
        txn.commit().await?;
        Ok(removed)
    }

    async fn purge_expired(
        &self,
        partition: Partition,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let expired = partition_record::Entity::find()
            .filter(partition_record::Column::Partition.eq(partition.to_string()))
            .filter(partition_record::Column::ExpiresAt.lte(now))
            .all(self.db.as_ref())
            .await?;

        let mut purged = 0;
        for model in expired {
            let txn = self.db.begin().await?;
            if delete_record(&txn, partition, &model.pk, &model.sk).await? {
                purged += 1;
            }
            txn.commit().await?;
        }
        debug!(
            "Purged {} expired records from partition {}",
            purged, partition
        );
        Ok(purged)
    }
}
